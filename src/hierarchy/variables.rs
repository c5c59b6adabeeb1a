use crate::data::Centering;

/// Scalar kind stored by a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VariableKind {
    /// Double-precision field data.
    Double,
    /// Integer flag data (masking functions).
    Flag,
}

/// Declaration of one variable: its centering, depth, and scalar kind.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub centering: Centering,
    pub depth: usize,
    pub kind: VariableKind,
}

/// Registry mapping integer data indices to declared variables.
///
/// Data indices are handed out densely in registration order; operators use
/// them to look up centering and depth without probing patch data at fill
/// time.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct VariableDatabase {
    records: Vec<VariableRecord>,
}

impl VariableDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a double-precision variable, returning its data index.
    pub fn register_variable(
        &mut self,
        name: impl Into<String>,
        centering: Centering,
        depth: usize,
    ) -> usize {
        assert!(depth > 0, "variables require a positive depth");

        self.records.push(VariableRecord {
            name: name.into(),
            centering,
            depth,
            kind: VariableKind::Double,
        });

        self.records.len() - 1
    }

    /// Registers an integer side-centered flag variable.
    pub fn register_flag_variable(&mut self, name: impl Into<String>) -> usize {
        self.records.push(VariableRecord {
            name: name.into(),
            centering: Centering::Side,
            depth: 1,
            kind: VariableKind::Flag,
        });

        self.records.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The declaration for a data index. Panics on an unknown index: an
    /// unregistered index in a transaction component is caller misuse.
    pub fn record(&self, data_index: usize) -> &VariableRecord {
        self.records.get(data_index).unwrap_or_else(|| {
            panic!("data index {data_index} does not name a registered variable")
        })
    }

    pub fn centering(&self, data_index: usize) -> Centering {
        self.record(data_index).centering
    }

    pub fn depth(&self, data_index: usize) -> usize {
        self.record(data_index).depth
    }
}
