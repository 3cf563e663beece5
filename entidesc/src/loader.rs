//! Loading entity descriptors from declaration files.
//!
//! Each entity is declared in `<entities_dir>/<name>.toml`. Building a
//! descriptor merges the fields and indexes of its parents, injects the id
//! field and validates indexes; the result is cached under a freshness token
//! derived from the declaration file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::cache::{CacheKey, DescriptorCache, Freshness, MemoryDescriptorCache};
use crate::declaration::{EntityDeclaration, parse_index};
use crate::errors::{ConfigError, SchemaError, SchemaResult};
use crate::types::{DEFAULT_ID_FIELD, DESCRIPTOR_VERSION, EntityDescriptor, FieldDescriptor};

pub const DECLARATION_EXTENSION: &str = "toml";

/// Per-entity overrides supplied by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBinding {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

pub struct DescriptorLoader {
    entities_dir: PathBuf,
    cache: Arc<dyn DescriptorCache>,
    bindings: HashMap<String, EntityBinding>,
    always_reload: bool,
}

impl DescriptorLoader {
    pub fn new(entities_dir: impl Into<PathBuf>) -> Self {
        Self {
            entities_dir: entities_dir.into(),
            cache: Arc::new(MemoryDescriptorCache::new()),
            bindings: HashMap::new(),
            always_reload: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn DescriptorCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, binding: EntityBinding) -> Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    pub fn with_bindings(mut self, bindings: HashMap<String, EntityBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Skip the cache on reads. Built descriptors are still stored.
    pub fn always_reload(mut self, always_reload: bool) -> Self {
        self.always_reload = always_reload;
        self
    }

    pub fn entities_dir(&self) -> &Path {
        &self.entities_dir
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.entities_dir.join(format!("{name}.{DECLARATION_EXTENSION}"))
    }

    fn binding(&self, name: &str) -> Option<&EntityBinding> {
        self.bindings.get(name)
    }

    fn cache_key(&self, name: &str) -> CacheKey {
        CacheKey::new(name, self.binding(name).and_then(|b| b.class.clone()))
    }

    /// Names of every declared entity, sorted.
    pub fn list_entities(&self) -> SchemaResult<Vec<String>> {
        if !self.entities_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.entities_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != DECLARATION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_declaration(&self, name: &str) -> SchemaResult<EntityDeclaration> {
        let path = self.source_path(name);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::SourceNotFound {
                    entity: name.to_string(),
                    path,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        EntityDeclaration::from_toml(&source).map_err(|e| {
            ConfigError::Malformed {
                path,
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load a descriptor, from the cache when its source did not change.
    pub fn load(&self, name: &str) -> SchemaResult<EntityDescriptor> {
        self.load_in(name, &mut Vec::new())
    }

    /// Load every declared entity, abstract ones included.
    pub fn load_all(&self) -> SchemaResult<Vec<EntityDescriptor>> {
        self.list_entities()?.iter().map(|name| self.load(name)).collect()
    }

    /// Build a descriptor from its declaration, bypassing the cache for this
    /// entity. Parents still go through [`DescriptorLoader::load`].
    pub fn build(&self, name: &str) -> SchemaResult<EntityDescriptor> {
        self.build_in(name, &mut Vec::new())
    }

    fn load_in(&self, name: &str, chain: &mut Vec<String>) -> SchemaResult<EntityDescriptor> {
        let path = self.source_path(name);
        let token = match Freshness::for_source(&path) {
            Ok(token) => token,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::SourceNotFound {
                    entity: name.to_string(),
                    path,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        let key = self.cache_key(name);

        if !self.always_reload
            && let Some(descriptor) = self.cache.fetch(&key, &token)
        {
            debug!("Loaded descriptor {name} from cache");
            return Ok(descriptor);
        }

        let descriptor = self.build_in(name, chain)?;
        if let Err(e) = self.cache.store(&key, &token, &descriptor) {
            warn!("Failed to cache descriptor {name}: {e}");
        }
        Ok(descriptor)
    }

    fn build_in(&self, name: &str, chain: &mut Vec<String>) -> SchemaResult<EntityDescriptor> {
        if chain.iter().any(|seen| seen == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ConfigError::ParentCycle {
                entity: chain.first().cloned().unwrap_or_else(|| name.to_string()),
                chain: cycle,
            }
            .into());
        }
        let declaration = self.read_declaration(name)?;
        if declaration.fields.is_empty() {
            return Err(ConfigError::EmptyDeclaration {
                entity: name.to_string(),
            }
            .into());
        }

        let binding = self.binding(name).cloned().unwrap_or_default();
        let id_field = binding.id_field.clone().unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());

        let mut fields: IndexMap<String, FieldDescriptor> = IndexMap::new();
        fields.insert(id_field.clone(), FieldDescriptor::id(&id_field));
        let mut indexes = Vec::new();

        chain.push(name.to_string());
        for parent_name in declaration.parents() {
            let parent = self.load_in(parent_name, chain)?;
            for (field_name, field) in parent.fields {
                if field_name != id_field && field_name != parent.id_field {
                    fields.insert(field_name, field);
                }
            }
            indexes.extend(parent.indexes);
        }
        chain.pop();

        for (field_name, field_declaration) in &declaration.fields {
            if *field_name == id_field {
                debug!("Ignoring declaration of id field {field_name} in {name}");
                continue;
            }
            fields.insert(field_name.clone(), field_declaration.to_field(field_name)?);
        }

        for index_declaration in &declaration.indexes {
            indexes.push(parse_index(name, index_declaration)?);
        }
        for index in &indexes {
            if let Some(missing) = index.fields.iter().find(|field| !fields.contains_key(*field)) {
                return Err(ConfigError::UnknownIndexField {
                    entity: name.to_string(),
                    field: missing.clone(),
                }
                .into());
            }
        }

        debug!("Built descriptor {name} with {} fields and {} indexes", fields.len(), indexes.len());
        Ok(EntityDescriptor {
            name: name.to_string(),
            class: binding.class,
            version: DESCRIPTOR_VERSION,
            table: binding.table,
            id_field,
            fields,
            indexes,
            is_abstract: declaration.is_abstract(),
        })
    }
}
