use serde::{Deserialize, Serialize};

/// How confidently a day-over-day increase can be pinned on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification label attached to stopped-VM waste findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WasteClassification {
    PossiblyUnused,
    LikelyUnused,
}

impl WasteClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PossiblyUnused => "Possibly unused",
            Self::LikelyUnused => "Likely unused",
        }
    }
}

impl std::fmt::Display for WasteClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingType {
    UnattachedDisk,
    UnusedPublicIp,
    StoppedVm,
}

impl FindingType {
    pub const ALL: [FindingType; 3] = [
        Self::UnattachedDisk,
        Self::UnusedPublicIp,
        Self::StoppedVm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnattachedDisk => "unattached_disk",
            Self::UnusedPublicIp => "unused_public_ip",
            Self::StoppedVm => "stopped_vm",
        }
    }
}

impl std::fmt::Display for FindingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
