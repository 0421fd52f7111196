use super::record::Record;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// A closed status enum together with its transition table.
///
/// Implemented through [`lifecycle!`](crate::lifecycle).
pub trait Lifecycle:
    Copy + Eq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    /// States reachable from `self` in one step.
    fn successors(self) -> &'static [Self];

    fn can_become(self, next: Self) -> bool {
        self == next || self.successors().contains(&next)
    }

    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// A record whose status follows a [`Lifecycle`].
pub trait HasStatus: Record {
    type Status: Lifecycle;

    fn status(&self) -> Self::Status;

    fn set_status(&mut self, status: Self::Status);

    /// Side effects of entering `status` (timestamps, counters).
    fn on_transition(&mut self, _from: Self::Status) {}
}
