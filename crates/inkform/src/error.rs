//! Pipeline error taxonomy.
//!
//! Recoverable errors short-circuit the page; an empty cell is not an error
//! and is skipped silently by the cell loop.

/// Errors surfaced by the page pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Template configuration failed validation before any processing began.
    ConfigInvalid(String),
    /// One or more corner fiducials could not be located in the scan.
    ///
    /// `found` is indexed TL, TR, BL, BR.
    FiducialsMissing { found: [bool; 4] },
    /// Fiducial correspondences were collinear or the DLT system was
    /// near-singular.
    HomographyDegenerate(String),
    /// A binary input did not satisfy the ink=255 convention and could not
    /// be normalized. Indicates a programming error in the caller.
    InvalidPolarity,
    /// The host progress callback requested cancellation.
    Cancelled,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "invalid template config: {}", msg),
            Self::FiducialsMissing { found } => {
                const NAMES: [&str; 4] = ["TL", "TR", "BL", "BR"];
                let missing: Vec<&str> = NAMES
                    .iter()
                    .zip(found.iter())
                    .filter(|(_, &ok)| !ok)
                    .map(|(&n, _)| n)
                    .collect();
                write!(f, "fiducials missing: {}", missing.join(", "))
            }
            Self::HomographyDegenerate(msg) => write!(f, "degenerate homography: {}", msg),
            Self::InvalidPolarity => write!(f, "binary mask is not ink=255 polarity"),
            Self::Cancelled => write!(f, "cancelled by host"),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiducials_missing_names_absent_corners() {
        let err = PipelineError::FiducialsMissing {
            found: [true, false, true, false],
        };
        assert_eq!(err.to_string(), "fiducials missing: TR, BR");
    }
}
