//! Per-entity hydra attribute association.
//!
//! # Responsibility
//! - Answer which accessor methods an entity currently supports.
//! - Dispatch accessor calls against cached per-attribute state.
//! - Hydrate state lazily from the value store and flush dirty values back.
//!
//! # Invariants
//! - Accessor support is resolved against the registry on every call; no
//!   definitions are cached here.
//! - Cached state is keyed by attribute id, so a rename keeps the value.
//! - Cached state whose backend type changed is re-cast on next access; its
//!   previous value falls back to the default, since the old rows are gone.
//! - The first miss hydrates every allowed attribute at once, so hydration
//!   issues at most one value query per backend type.

pub mod method;

use crate::model::attribute::{AttributeId, BackendType, HydraAttribute};
use crate::model::entity::{EntityRecord, HostEntity};
use crate::model::set::SetId;
use crate::model::value::HydraValue;
use crate::repo::attribute_repo::AttributeRepository;
use crate::repo::set_repo::SetRepository;
use crate::repo::value_repo::{ValueStore, ValueWrite};
use crate::repo::RepoError;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use method::{ProxyMethod, ProxyOperation};

pub type AssociationResult<T> = Result<T, AssociationError>;

/// Accessor dispatch error.
#[derive(Debug)]
pub enum AssociationError {
    /// No attribute of the entity type backs the requested accessor.
    UnknownProxyMethod { method: String },
    /// The attribute exists but is not a member of the entity's set.
    MissingAttributeInSet {
        attribute_id: AttributeId,
        set_id: SetId,
    },
    WrongArgumentCount {
        method: String,
        expected: usize,
        given: usize,
    },
    Repo(RepoError),
}

impl Display for AssociationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProxyMethod { method } => write!(f, "Unknown :{method} method"),
            Self::MissingAttributeInSet {
                attribute_id,
                set_id,
            } => write!(f, "Attribute ID {attribute_id} is missed in Set ID {set_id}"),
            Self::WrongArgumentCount {
                method,
                expected,
                given,
            } => write!(
                f,
                "wrong number of arguments for :{method} (given {given}, expected {expected})"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssociationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssociationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result of one accessor dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyOutput {
    Value(HydraValue),
    Present(bool),
    Assigned,
}

impl ProxyOutput {
    pub fn into_value(self) -> Option<HydraValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_present(&self) -> Option<bool> {
        match self {
            Self::Present(flag) => Some(*flag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct AttributeState {
    backend_type: BackendType,
    value: HydraValue,
    was: HydraValue,
    raw: HydraValue,
}

impl AttributeState {
    fn loaded(backend_type: BackendType, raw: HydraValue) -> Self {
        let value = raw.cast(backend_type);
        Self {
            backend_type,
            was: value.clone(),
            value,
            raw,
        }
    }

    fn assign(&mut self, raw: HydraValue) {
        self.value = raw.cast(self.backend_type);
        self.raw = raw;
    }

    fn retype(&mut self, attribute: &HydraAttribute) {
        self.backend_type = attribute.backend_type;
        self.value = self.raw.cast(attribute.backend_type);
        self.was = attribute.default_cast();
    }

    fn is_dirty(&self) -> bool {
        !self.value.same_as(&self.was, self.backend_type)
    }
}

/// Host entity and cached state captured before a save or destroy.
pub(crate) struct AssociationCheckpoint<E> {
    entity: E,
    states: BTreeMap<AttributeId, AttributeState>,
}

/// Hydra attribute state attached to one host entity.
///
/// Repositories are borrowed; the association owns the host entity so the
/// set id and persistence flag it reads are always the entity's current ones.
pub struct AttributeAssociation<'a, E = EntityRecord> {
    entity: E,
    attributes: &'a dyn AttributeRepository,
    sets: &'a dyn SetRepository,
    values: &'a dyn ValueStore,
    states: BTreeMap<AttributeId, AttributeState>,
}

impl<'a, E: HostEntity> AttributeAssociation<'a, E> {
    pub fn new(
        entity: E,
        attributes: &'a dyn AttributeRepository,
        sets: &'a dyn SetRepository,
        values: &'a dyn ValueStore,
    ) -> Self {
        Self {
            entity,
            attributes,
            sets,
            values,
            states: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub(crate) fn checkpoint(&self) -> AssociationCheckpoint<E>
    where
        E: Clone,
    {
        AssociationCheckpoint {
            entity: self.entity.clone(),
            states: self.states.clone(),
        }
    }

    /// Puts back the entity and cached state of a rolled back transaction.
    pub(crate) fn restore(&mut self, checkpoint: AssociationCheckpoint<E>) {
        self.entity = checkpoint.entity;
        self.states = checkpoint.states;
    }

    /// Whether `method` is a supported accessor for this entity right now.
    pub fn has_proxy_method(&self, method: &str) -> AssociationResult<bool> {
        let Some(proxy) = ProxyMethod::parse(method) else {
            return Ok(false);
        };
        let entity_type = self.entity.entity_type();
        let Some(attribute) = self
            .attributes
            .find_attribute(entity_type, &proxy.attribute)?
        else {
            return Ok(false);
        };
        Ok(self
            .sets
            .is_allowed(entity_type, self.entity.hydra_set_id(), attribute.id)?)
    }

    /// Dispatches an accessor call by method name.
    ///
    /// Setters take exactly one argument; every other accessor takes none.
    pub fn delegate(
        &mut self,
        method: &str,
        args: &[HydraValue],
    ) -> AssociationResult<ProxyOutput> {
        let proxy = ProxyMethod::parse(method).ok_or_else(|| {
            AssociationError::UnknownProxyMethod {
                method: method.to_string(),
            }
        })?;
        let expected = proxy.operation.arity();
        if args.len() != expected {
            return Err(AssociationError::WrongArgumentCount {
                method: proxy.to_string(),
                expected,
                given: args.len(),
            });
        }
        self.dispatch(&proxy, args.first().cloned())
    }

    /// Current cast value of `name`.
    pub fn get(&mut self, name: &str) -> AssociationResult<HydraValue> {
        let proxy = ProxyMethod::new(name, ProxyOperation::Get);
        Ok(self.dispatch(&proxy, None)?.into_value().unwrap_or_default())
    }

    /// Assigns a raw value to `name`. It is cast immediately and kept raw too.
    pub fn set(&mut self, name: &str, value: impl Into<HydraValue>) -> AssociationResult<()> {
        let proxy = ProxyMethod::new(name, ProxyOperation::Set);
        self.dispatch(&proxy, Some(value.into()))?;
        Ok(())
    }

    /// Value of `name` as of the last load or save.
    pub fn was(&mut self, name: &str) -> AssociationResult<HydraValue> {
        let proxy = ProxyMethod::new(name, ProxyOperation::Was);
        Ok(self.dispatch(&proxy, None)?.into_value().unwrap_or_default())
    }

    /// Raw value of `name` as last assigned, loaded or defaulted.
    pub fn before_type_cast(&mut self, name: &str) -> AssociationResult<HydraValue> {
        let proxy = ProxyMethod::new(name, ProxyOperation::BeforeTypeCast);
        Ok(self.dispatch(&proxy, None)?.into_value().unwrap_or_default())
    }

    pub fn is_present(&mut self, name: &str) -> AssociationResult<bool> {
        let proxy = ProxyMethod::new(name, ProxyOperation::Present);
        Ok(self
            .dispatch(&proxy, None)?
            .as_present()
            .unwrap_or_default())
    }

    /// Definitions the entity may use under its current set, ordered by id.
    pub fn allowed_attributes(&self) -> AssociationResult<Vec<HydraAttribute>> {
        let entity_type = self.entity.entity_type();
        let mut definitions = self.attributes.list_attributes(entity_type)?;
        if let Some(set_id) = self.entity.hydra_set_id() {
            let allowed = self.sets.allowed_attribute_ids(entity_type, set_id)?;
            definitions.retain(|attribute| allowed.contains(&attribute.id));
        }
        Ok(definitions)
    }

    /// Name to cast value for every allowed attribute.
    pub fn hydra_attributes(&mut self) -> AssociationResult<BTreeMap<String, HydraValue>> {
        self.snapshot(|state| state.value.clone())
    }

    /// Name to raw value for every allowed attribute.
    pub fn hydra_attributes_before_type_cast(
        &mut self,
    ) -> AssociationResult<BTreeMap<String, HydraValue>> {
        self.snapshot(|state| state.raw.clone())
    }

    /// Names of allowed attributes whose value differs from the last load or save.
    pub fn changed_attributes(&mut self) -> AssociationResult<Vec<String>> {
        let definitions = self.allowed_attributes()?;
        Ok(definitions
            .into_iter()
            .filter(|attribute| self.cached_dirty(attribute))
            .map(|attribute| attribute.name)
            .collect())
    }

    /// Drops cached state; the next access hydrates again.
    pub fn reload(&mut self) {
        self.states.clear();
    }

    /// Whether any allowed attribute has an unsaved change.
    pub fn before_save(&mut self) -> AssociationResult<bool> {
        let definitions = self.allowed_attributes()?;
        Ok(definitions
            .iter()
            .any(|attribute| self.cached_dirty(attribute)))
    }

    /// Flushes dirty allowed attributes to the value store.
    ///
    /// Must run after the host record has an id. Returns the number of
    /// attributes written.
    pub fn after_save(&mut self) -> AssociationResult<usize> {
        let entity_id = self.entity.entity_id().ok_or_else(|| {
            RepoError::InvalidData("cannot save hydra attributes of an unsaved entity".to_string())
        })?;
        let definitions = self.allowed_attributes()?;
        let entity_type = self.entity.entity_type().to_string();

        let mut written = 0;
        let mut omitted = 0;
        for attribute in &definitions {
            if !self.cached_dirty(attribute) {
                continue;
            }
            let Some(state) = self.states.get_mut(&attribute.id) else {
                continue;
            };
            if state.backend_type != attribute.backend_type {
                state.retype(attribute);
            }
            match self
                .values
                .save_or_delete(&entity_type, entity_id, attribute, &state.value)?
            {
                ValueWrite::Upserted => written += 1,
                ValueWrite::Deleted => omitted += 1,
            }
            state.was = state.value.clone();
        }

        debug!(
            "event=hydra_flush module=association status=ok entity_type={} entity_id={} upserted={} omitted={}",
            entity_type, entity_id, written, omitted
        );
        Ok(written + omitted)
    }

    /// Removes every stored value of the entity and clears cached state.
    pub fn after_destroy(&mut self) -> AssociationResult<usize> {
        let removed = match self.entity.entity_id() {
            Some(entity_id) => self
                .values
                .delete_all_for_entity(self.entity.entity_type(), entity_id)?,
            None => 0,
        };
        self.states.clear();
        Ok(removed)
    }

    fn dispatch(
        &mut self,
        proxy: &ProxyMethod,
        arg: Option<HydraValue>,
    ) -> AssociationResult<ProxyOutput> {
        let attribute = self.resolve(proxy)?;
        let state = self.state_for(&attribute)?;
        let output = match proxy.operation {
            ProxyOperation::Get => ProxyOutput::Value(state.value.clone()),
            ProxyOperation::Set => {
                state.assign(arg.unwrap_or_default());
                ProxyOutput::Assigned
            }
            ProxyOperation::Was => ProxyOutput::Value(state.was.clone()),
            ProxyOperation::BeforeTypeCast => ProxyOutput::Value(state.raw.clone()),
            ProxyOperation::Present => ProxyOutput::Present(state.value.is_present()),
        };
        Ok(output)
    }

    fn resolve(&self, proxy: &ProxyMethod) -> AssociationResult<HydraAttribute> {
        let entity_type = self.entity.entity_type();
        let attribute = self
            .attributes
            .find_attribute(entity_type, &proxy.attribute)?
            .ok_or_else(|| AssociationError::UnknownProxyMethod {
                method: proxy.to_string(),
            })?;

        if let Some(set_id) = self.entity.hydra_set_id() {
            if !self
                .sets
                .is_allowed(entity_type, Some(set_id), attribute.id)?
            {
                return Err(AssociationError::MissingAttributeInSet {
                    attribute_id: attribute.id,
                    set_id,
                });
            }
        }
        Ok(attribute)
    }

    fn state_for(&mut self, attribute: &HydraAttribute) -> AssociationResult<&mut AttributeState> {
        if self.states.contains_key(&attribute.id) {
            self.hydrate(std::slice::from_ref(attribute))?;
        } else {
            let mut batch = self.allowed_attributes()?;
            if !batch.iter().any(|allowed| allowed.id == attribute.id) {
                batch.push(attribute.clone());
            }
            self.hydrate(&batch)?;
        }
        self.states.get_mut(&attribute.id).ok_or_else(|| {
            AssociationError::Repo(RepoError::InvalidData(format!(
                "attribute {} was not hydrated",
                attribute.id
            )))
        })
    }

    fn snapshot(
        &mut self,
        pick: impl Fn(&AttributeState) -> HydraValue,
    ) -> AssociationResult<BTreeMap<String, HydraValue>> {
        let definitions = self.allowed_attributes()?;
        self.hydrate(&definitions)?;
        Ok(definitions
            .into_iter()
            .filter_map(|attribute| {
                let value = self.states.get(&attribute.id).map(&pick)?;
                Some((attribute.name, value))
            })
            .collect())
    }

    fn cached_dirty(&self, attribute: &HydraAttribute) -> bool {
        self.states.get(&attribute.id).is_some_and(|state| {
            let mut state = state.clone();
            if state.backend_type != attribute.backend_type {
                state.retype(attribute);
            }
            state.is_dirty()
        })
    }

    /// Ensures state exists for every attribute in `definitions`.
    fn hydrate(&mut self, definitions: &[HydraAttribute]) -> AssociationResult<()> {
        let mut missing = Vec::new();
        for attribute in definitions {
            match self.states.get_mut(&attribute.id) {
                Some(state) if state.backend_type != attribute.backend_type => {
                    state.retype(attribute);
                }
                Some(_) => {}
                None => missing.push(attribute),
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let mut stored = self.load_stored(&missing)?;
        for attribute in missing {
            let raw = stored
                .remove(&attribute.id)
                .unwrap_or_else(|| attribute.default_raw());
            self.states
                .insert(attribute.id, AttributeState::loaded(attribute.backend_type, raw));
        }
        Ok(())
    }

    fn load_stored(
        &self,
        missing: &[&HydraAttribute],
    ) -> AssociationResult<HashMap<AttributeId, HydraValue>> {
        let entity_id = match self.entity.entity_id() {
            Some(id) if self.entity.is_persisted() => id,
            _ => return Ok(HashMap::new()),
        };

        let mut grouped: BTreeMap<BackendType, Vec<AttributeId>> = BTreeMap::new();
        for attribute in missing {
            grouped
                .entry(attribute.backend_type)
                .or_default()
                .push(attribute.id);
        }
        Ok(self
            .values
            .load_many(self.entity.entity_type(), entity_id, &grouped)?)
    }
}
