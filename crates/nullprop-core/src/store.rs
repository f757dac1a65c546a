//! Entity store: identity keys, location handles, and live declarations.
//!
//! The store owns the [`Program`] and its [`SemanticModel`]. Entities never
//! hold declarations; they hold a [`Location`] that is re-resolved against
//! the program on every access, so a rewrite of one declaration never leaves
//! another entity pointing at stale syntax.
//!
//! [`EntityStore::apply_mutation`] is the only way to change the program. It
//! enforces two invariants before touching anything:
//!
//! - **Identity**: the replacement has the same key as the original.
//! - **Monotonicity**: every slot annotated before is still annotated, and
//!   the replacement has the same slots in the same order.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{NullpropError, NullpropResult};
use crate::program::{Program, SourceFile};
use crate::semantic::{SemanticContext, SemanticModel};
use crate::signature::{EntityKey, EntityKind};
use crate::syntax::Declaration;

/// Where an entity's declaration lives: file plus normalized signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub signature: EntityKey,
}

/// A uniquely addressable program entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub key: EntityKey,
    pub kind: EntityKind,
    /// `None` for external methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Entity {
    /// Entity for a declaration in `file`.
    pub fn declared(file: impl Into<String>, decl: &Declaration) -> Self {
        let key = decl.key();
        Entity {
            location: Some(Location {
                file: file.into(),
                signature: key.clone(),
            }),
            kind: decl.kind(),
            key,
        }
    }

    /// Entity for a callee with no local declaration.
    pub fn external(key: impl Into<EntityKey>) -> Self {
        Entity {
            key: key.into(),
            kind: EntityKind::ExternalMethod,
            location: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.location.is_none()
    }
}

/// Owns the program, its semantic model, and the entity registry.
#[derive(Debug)]
pub struct EntityStore {
    program: Program,
    model: SemanticModel,
    entities: BTreeMap<EntityKey, Entity>,
    mutations: usize,
}

impl EntityStore {
    pub fn new(program: Program) -> Self {
        let model = SemanticModel::build(&program);
        EntityStore {
            program,
            model,
            entities: BTreeMap::new(),
            mutations: 0,
        }
    }

    /// Register an entity. Registering the same key twice is an invariant
    /// violation.
    pub fn register(&mut self, entity: Entity) -> NullpropResult<()> {
        if self.entities.contains_key(&entity.key) {
            return Err(NullpropError::DuplicateEntity { key: entity.key });
        }
        self.entities.insert(entity.key.clone(), entity);
        Ok(())
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Look up an entity by identity.
    pub fn resolve(&self, key: &EntityKey) -> NullpropResult<&Entity> {
        self.entities
            .get(key)
            .ok_or_else(|| NullpropError::EntityNotFound { key: key.clone() })
    }

    /// Look up an entity by identity, returning `None` if unregistered.
    pub fn try_resolve(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Registered entities in key order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The live declaration for `entity`, borrowed from the program.
    pub fn declaration(&self, entity: &Entity) -> NullpropResult<&Declaration> {
        let (file, index) = self.locate(entity)?;
        Ok(&file.declarations[index])
    }

    /// An owned copy of the live declaration for `entity`.
    pub fn current_declaration(&self, entity: &Entity) -> NullpropResult<Declaration> {
        self.declaration(entity).cloned()
    }

    /// Semantic view of `entity`'s file, scoped to its live declaration.
    pub fn current_context(&self, entity: &Entity) -> NullpropResult<SemanticContext<'_>> {
        let (file, index) = self.locate(entity)?;
        Ok(SemanticContext::new(&self.model, file).within(&file.declarations[index]))
    }

    /// Replace `entity`'s declaration with `new`.
    ///
    /// Returns `Ok(false)` without touching the program when `new` equals the
    /// live declaration. Otherwise checks identity and monotonicity, swaps the
    /// declaration in, bumps the file version, and rebuilds the semantic model.
    pub fn apply_mutation(&mut self, entity: &Entity, new: Declaration) -> NullpropResult<bool> {
        let (path, index) = {
            let (file, index) = self.locate(entity)?;
            (file.path.clone(), index)
        };

        let file = self
            .program
            .file_mut(&path)
            .ok_or_else(|| NullpropError::FileNotFound { path: path.clone() })?;
        let current = &file.declarations[index];
        if *current == new {
            trace!(entity = %entity.key, "mutation is a no-op");
            return Ok(false);
        }

        let actual = new.key();
        if actual != entity.key {
            return Err(NullpropError::IdentityChanged {
                key: entity.key.clone(),
                actual,
            });
        }
        check_monotonic(&entity.key, current, &new)?;

        file.declarations[index] = new;
        file.version += 1;
        let version = file.version;
        self.model = self.model.rebuild(&self.program);
        self.mutations += 1;

        debug!(
            entity = %entity.key,
            file = %path,
            version,
            generation = self.model.generation(),
            "applied mutation"
        );
        Ok(true)
    }

    /// Live constructors of `container`, instance or static.
    pub fn constructors_of(&self, container: &str, is_static: bool) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|entity| entity.kind == EntityKind::Method)
            .filter(|entity| {
                self.declaration(entity)
                    .ok()
                    .and_then(Declaration::as_method)
                    .is_some_and(|m| {
                        m.is_constructor()
                            && m.container == container
                            && m.modifiers.is_static == is_static
                    })
            })
            .collect()
    }

    /// Number of applied (non no-op) mutations.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    /// Find the single declaration `entity`'s location handle names.
    fn locate(&self, entity: &Entity) -> NullpropResult<(&SourceFile, usize)> {
        let location = entity
            .location
            .as_ref()
            .ok_or_else(|| NullpropError::ExternalEntity {
                key: entity.key.clone(),
            })?;
        let file = self
            .program
            .file(&location.file)
            .ok_or_else(|| NullpropError::FileNotFound {
                path: location.file.clone(),
            })?;

        let mut matches = file
            .declarations
            .iter()
            .enumerate()
            .filter(|(_, decl)| decl.key() == location.signature)
            .map(|(index, _)| index);

        let first = matches
            .next()
            .ok_or_else(|| NullpropError::MissingDeclaration {
                file: location.file.clone(),
                signature: location.signature.clone(),
            })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(NullpropError::DuplicateDeclaration {
                file: location.file.clone(),
                signature: location.signature.clone(),
                count: extra + 1,
            });
        }
        Ok((file, first))
    }
}

/// Compare two versions of a declaration slot by slot.
fn check_monotonic(key: &EntityKey, old: &Declaration, new: &Declaration) -> NullpropResult<()> {
    let mut before = Vec::new();
    old.for_each_type(&mut |ty| before.push((ty.name.as_str(), ty.nullable)));
    let mut after = Vec::new();
    new.for_each_type(&mut |ty| after.push((ty.name.as_str(), ty.nullable)));

    if before.len() != after.len() {
        return Err(NullpropError::NonMonotonicRewrite {
            key: key.clone(),
            reason: format!(
                "slot count changed from {} to {}",
                before.len(),
                after.len()
            ),
        });
    }
    for (index, ((old_name, was), (new_name, now))) in before.iter().zip(&after).enumerate() {
        if old_name != new_name {
            return Err(NullpropError::NonMonotonicRewrite {
                key: key.clone(),
                reason: format!("slot {} changed type from {} to {}", index, old_name, new_name),
            });
        }
        if *was && !*now {
            return Err(NullpropError::NonMonotonicRewrite {
                key: key.clone(),
                reason: format!("annotation removed from slot {} ({})", index, old_name),
            });
        }
    }
    Ok(())
}
