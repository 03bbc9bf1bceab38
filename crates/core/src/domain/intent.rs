use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingTarget {
    InternalBucket,
    ExternalTeamStore,
}

impl RoutingTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalBucket => "internal_bucket",
            Self::ExternalTeamStore => "external_team_store",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub body: String,
    pub target: RoutingTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Feedback(Command),
    Bug(Command),
    Query(Command),
    None,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Feedback(_) => "feedback",
            Self::Bug(_) => "bug",
            Self::Query(_) => "query",
            Self::None => "none",
        }
    }

    pub fn command(&self) -> Option<&Command> {
        match self {
            Self::Feedback(command) | Self::Bug(command) | Self::Query(command) => Some(command),
            Self::None => None,
        }
    }
}
