//! Operator registry keyed by (domain, type, version range).

use crate::{Domain, Error, KernelFactory, OperatorDescriptor, OperatorKey, Result, VersionRange};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A descriptor paired with the factory that builds its kernels.
#[derive(Clone)]
pub struct Registration {
    pub descriptor: Arc<OperatorDescriptor>,
    pub factory: Arc<dyn KernelFactory>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", self.descriptor.key())
            .field("versions", &self.descriptor.versions())
            .finish_non_exhaustive()
    }
}

/// Registry of operator implementations.
///
/// Registration happens during start-up through `&mut self`. Once populated,
/// [`OperatorRegistry::freeze`] moves the registry behind an `Arc`, after
/// which it can be shared across threads for lock-free lookups and can no
/// longer be written to.
///
/// # Example
///
/// ```
/// # use ortex_core::{DataType, Kernel, KernelCtx, OperatorDescriptor, OperatorRegistry, Result};
/// # #[derive(Debug)] struct Noop;
/// # impl Kernel for Noop {
/// #     fn infer_outputs(&self, i: &[ortex_core::TensorMeta]) -> Result<Vec<ortex_core::TensorMeta>> { Ok(i.to_vec()) }
/// #     fn compute(&self, _: &[ortex_core::TensorView<'_>], _: &mut [ortex_core::TensorViewMut<'_>]) -> Result<()> { Ok(()) }
/// # }
/// let mut registry = OperatorRegistry::new();
/// let descriptor = OperatorDescriptor::builder("com.example", "Noop")
///     .since(1)
///     .input("X")
///     .output("Y")
///     .types([DataType::F32])
///     .build();
/// registry
///     .register(descriptor, |_: &KernelCtx<'_>| -> Result<Box<dyn Kernel>> { Ok(Box::new(Noop)) })
///     .unwrap();
///
/// let registry = registry.freeze();
/// assert!(registry.lookup(&"com.example".into(), "Noop", 7).is_ok());
/// ```
#[derive(Default)]
pub struct OperatorRegistry {
    operators: HashMap<OperatorKey, Vec<Registration>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor with its kernel factory.
    ///
    /// Fails with `Conflict` if a registration for the same key already
    /// covers any version in the new range. The registry is left unchanged
    /// in that case.
    pub fn register<F>(&mut self, descriptor: OperatorDescriptor, factory: F) -> Result<()>
    where
        F: KernelFactory + 'static,
    {
        self.register_arc(Arc::new(descriptor), Arc::new(factory))
    }

    /// Like [`OperatorRegistry::register`], for already shared parts.
    ///
    /// Several registrations may share one factory, e.g. an operator whose
    /// semantics did not change between two opset ranges.
    pub fn register_arc(
        &mut self,
        descriptor: Arc<OperatorDescriptor>,
        factory: Arc<dyn KernelFactory>,
    ) -> Result<()> {
        let key = descriptor.key().clone();
        let requested = descriptor.versions();
        if requested.is_empty() {
            return Err(Error::EmptyVersionRange {
                key,
                versions: requested,
            });
        }
        let entries = self.operators.entry(key.clone()).or_default();

        if let Some(existing) = entries
            .iter()
            .find(|r| r.descriptor.versions().overlaps(&requested))
        {
            return Err(Error::Conflict {
                key,
                existing: existing.descriptor.versions(),
                requested,
            });
        }

        tracing::debug!(operator = %key, versions = %requested, "registered operator");
        entries.push(Registration { descriptor, factory });
        entries.sort_by_key(|r| r.descriptor.versions().since);
        Ok(())
    }

    /// Find the registration covering `version` of `domain::op_type`.
    ///
    /// Distinguishes an operator that was never registered in `domain`
    /// (`NotFound`) from one registered only for other versions
    /// (`VersionUnsupported`). Never falls back to another domain.
    pub fn lookup(&self, domain: &Domain, op_type: &str, version: u32) -> Result<&Registration> {
        let key = OperatorKey::new(domain.clone(), op_type);
        let entries = self
            .operators
            .get(&key)
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| Error::NotFound {
                domain: domain.clone(),
                op_type: op_type.to_string(),
            })?;

        entries
            .iter()
            .find(|r| r.descriptor.versions().contains(version))
            .ok_or_else(|| Error::VersionUnsupported {
                domain: domain.clone(),
                op_type: op_type.to_string(),
                version,
                registered: entries.iter().map(|r| r.descriptor.versions()).collect(),
            })
    }

    /// Check whether `domain::op_type` has any registration.
    pub fn contains(&self, domain: &Domain, op_type: &str) -> bool {
        self.operators
            .get(&OperatorKey::new(domain.clone(), op_type))
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Whether `descriptor` is registered with this exact factory instance.
    pub fn contains_registration(&self, descriptor: &OperatorDescriptor, factory: &Arc<dyn KernelFactory>) -> bool {
        self.operators.get(descriptor.key()).is_some_and(|entries| {
            entries
                .iter()
                .any(|r| *r.descriptor == *descriptor && Arc::ptr_eq(&r.factory, factory))
        })
    }

    /// Number of registrations (not distinct keys).
    pub fn len(&self) -> usize {
        self.operators.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Domains with at least one registration, sorted.
    pub fn domains(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self
            .operators
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(key, _)| key.domain.clone())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    /// Opset versions a domain supports: the span of all its registrations.
    pub fn domain_versions(&self, domain: &Domain) -> Option<VersionRange> {
        self.operators
            .iter()
            .filter(|(key, _)| key.domain == *domain)
            .flat_map(|(_, entries)| entries.iter().map(|r| r.descriptor.versions()))
            .reduce(|acc, range| acc.span(&range))
    }

    /// All registrations ordered by key, then version.
    pub fn registrations(&self) -> Vec<&Registration> {
        let sorted: BTreeMap<&OperatorKey, &Vec<Registration>> = self.operators.iter().collect();
        sorted.into_values().flatten().collect()
    }

    /// Finish registration and share the registry read-only.
    pub fn freeze(self) -> Arc<OperatorRegistry> {
        tracing::debug!(
            registrations = self.len(),
            domains = self.domains().len(),
            "operator registry frozen"
        );
        Arc::new(self)
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.registrations()).finish()
    }
}
