use foundation::math::PositionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Node(String),
    Link { source: String, target: String },
    Hotspot { node: String, hotspot: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Duplicate {
    Node(String),
    Hotspot { node: String, hotspot: String },
    /// A second link-kind hotspot for a target that already has one on the node.
    LinkHotspot { node: String, target: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TourError {
    NotFound(Missing),
    DuplicateId(Duplicate),
    InvalidPosition(PositionError),
    EmptyId,
}

impl TourError {
    pub(crate) fn node_not_found(id: &str) -> Self {
        TourError::NotFound(Missing::Node(id.to_string()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TourError::NotFound(_))
    }
}

impl std::fmt::Display for TourError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TourError::NotFound(Missing::Node(id)) => write!(f, "node not found: {id}"),
            TourError::NotFound(Missing::Link { source, target }) => {
                write!(f, "link not found: {source} -> {target}")
            }
            TourError::NotFound(Missing::Hotspot { node, hotspot }) => {
                write!(f, "hotspot not found: {node}/{hotspot}")
            }
            TourError::DuplicateId(Duplicate::Node(id)) => write!(f, "duplicate node id: {id}"),
            TourError::DuplicateId(Duplicate::Hotspot { node, hotspot }) => {
                write!(f, "duplicate hotspot id: {node}/{hotspot}")
            }
            TourError::DuplicateId(Duplicate::LinkHotspot { node, target }) => {
                write!(f, "node {node} already has a link hotspot for {target}")
            }
            TourError::InvalidPosition(e) => e.fmt(f),
            TourError::EmptyId => write!(f, "node id must not be empty"),
        }
    }
}

impl std::error::Error for TourError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TourError::InvalidPosition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PositionError> for TourError {
    fn from(e: PositionError) -> Self {
        TourError::InvalidPosition(e)
    }
}
