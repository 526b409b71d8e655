//! Closed label set for the BUSI breast ultrasound dataset.

use crate::types::{DatasetError, DatasetResult};

/// Label strings in class-id order.
pub const BUSI_LABELS: &[&str] = &["normal", "malignant", "benign"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusiLabel {
    Normal,
    Malignant,
    Benign,
}

impl BusiLabel {
    pub const ALL: [BusiLabel; 3] = [BusiLabel::Normal, BusiLabel::Malignant, BusiLabel::Benign];

    pub fn as_str(&self) -> &'static str {
        BUSI_LABELS[self.id()]
    }

    /// Position in [`BUSI_LABELS`].
    pub fn id(&self) -> usize {
        match self {
            BusiLabel::Normal => 0,
            BusiLabel::Malignant => 1,
            BusiLabel::Benign => 2,
        }
    }

    /// Exact, case-sensitive lookup into the label set.
    pub fn parse(label: &str) -> DatasetResult<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == label)
            .ok_or_else(|| DatasetError::UnknownLabel {
                label: label.to_string(),
                expected: BUSI_LABELS,
            })
    }
}

impl std::fmt::Display for BusiLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
