//! Immutable operator metadata.

use crate::{DataType, Domain, Error, Result, VersionRange};
use std::fmt;

/// Identity of an operator: its domain plus its type name.
///
/// Version ranges are not part of the key; one key can own
/// several registrations for disjoint ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorKey {
    pub domain: Domain,
    pub op_type: String,
}

impl OperatorKey {
    pub fn new(domain: impl Into<Domain>, op_type: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            op_type: op_type.into(),
        }
    }
}

impl fmt::Display for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.domain, self.op_type)
    }
}

/// A named formal input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalParam {
    pub name: String,
    pub optional: bool,
}

/// Everything the runtime knows about an operator before it runs.
///
/// Descriptors are built once through [`DescriptorBuilder`] and shared
/// behind an `Arc` afterwards; there is no way to mutate one in place.
/// Every input and output shares a single element type drawn from
/// [`OperatorDescriptor::allowed_types`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDescriptor {
    key: OperatorKey,
    versions: VersionRange,
    inputs: Vec<FormalParam>,
    outputs: Vec<FormalParam>,
    allowed_types: Vec<DataType>,
    doc: String,
}

impl OperatorDescriptor {
    /// Start describing `domain::op_type`.
    ///
    /// # Example
    /// ```
    /// # use ortex_core::{DataType, OperatorDescriptor};
    /// let descriptor = OperatorDescriptor::builder("com.example", "Scale")
    ///     .since(1)
    ///     .input("X")
    ///     .output("Y")
    ///     .types([DataType::F32])
    ///     .build();
    /// assert_eq!(descriptor.key().to_string(), "com.example::Scale");
    /// ```
    pub fn builder(domain: impl Into<Domain>, op_type: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            key: OperatorKey::new(domain, op_type),
            versions: VersionRange::single(1),
            inputs: Vec::new(),
            outputs: Vec::new(),
            allowed_types: Vec::new(),
            doc: String::new(),
        }
    }

    pub fn key(&self) -> &OperatorKey {
        &self.key
    }

    pub fn domain(&self) -> &Domain {
        &self.key.domain
    }

    pub fn op_type(&self) -> &str {
        &self.key.op_type
    }

    pub fn versions(&self) -> VersionRange {
        self.versions
    }

    pub fn inputs(&self) -> &[FormalParam] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FormalParam] {
        &self.outputs
    }

    pub fn allowed_types(&self) -> &[DataType] {
        &self.allowed_types
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Number of inputs a node must supply.
    pub fn required_inputs(&self) -> usize {
        self.inputs.iter().filter(|p| !p.optional).count()
    }

    /// Check that a node's actual input/output counts fit the formal lists.
    ///
    /// Optional inputs are trailing, so any count between the required
    /// count and the full list is accepted. Outputs must match exactly.
    pub fn check_arity(&self, inputs: usize, outputs: usize) -> Result<()> {
        let required = self.required_inputs();
        if inputs < required || inputs > self.inputs.len() {
            let expected = if required == self.inputs.len() {
                required.to_string()
            } else {
                format!("{required}..={}", self.inputs.len())
            };
            return Err(Error::Shape(format!(
                "{} expects {expected} inputs, got {inputs}",
                self.key
            )));
        }
        if outputs != self.outputs.len() {
            return Err(Error::Shape(format!(
                "{} expects {} outputs, got {outputs}",
                self.key,
                self.outputs.len()
            )));
        }
        Ok(())
    }

    /// Check one element type against the type constraint.
    pub fn check_type(&self, dtype: DataType) -> Result<()> {
        if self.allowed_types.contains(&dtype) {
            return Ok(());
        }
        let expected = self
            .allowed_types
            .iter()
            .map(|t| t.type_str())
            .collect::<Vec<_>>()
            .join(" | ");
        Err(Error::TypeMismatch {
            expected,
            actual: dtype.type_str().to_string(),
        })
    }
}

/// Builder for [`OperatorDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    key: OperatorKey,
    versions: VersionRange,
    inputs: Vec<FormalParam>,
    outputs: Vec<FormalParam>,
    allowed_types: Vec<DataType>,
    doc: String,
}

impl DescriptorBuilder {
    /// Open-ended range starting at `version`.
    pub fn since(mut self, version: u32) -> Self {
        self.versions = VersionRange::since(version);
        self
    }

    /// Close the range at `version` (inclusive).
    pub fn until(mut self, version: u32) -> Self {
        self.versions = VersionRange::new(self.versions.since, version);
        self
    }

    pub fn versions(mut self, versions: VersionRange) -> Self {
        self.versions = versions;
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(FormalParam {
            name: name.into(),
            optional: false,
        });
        self
    }

    /// Trailing optional input.
    pub fn optional_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(FormalParam {
            name: name.into(),
            optional: true,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(FormalParam {
            name: name.into(),
            optional: false,
        });
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = DataType>) -> Self {
        self.allowed_types.extend(types);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn build(self) -> OperatorDescriptor {
        debug_assert!(
            self.inputs
                .windows(2)
                .all(|pair| !pair[0].optional || pair[1].optional),
            "optional inputs of {} must be trailing",
            self.key
        );
        OperatorDescriptor {
            key: self.key,
            versions: self.versions,
            inputs: self.inputs,
            outputs: self.outputs,
            allowed_types: self.allowed_types,
            doc: self.doc,
        }
    }
}
