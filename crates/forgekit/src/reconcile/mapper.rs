use std::fmt::Debug;

use super::validate::Validate;
use crate::platform::DesiredInfo;

/// Conversion between a provider object and its unified info shape.
///
/// Both directions are pure. `apply_info` writes only the fields set in the
/// info and leaves server-assigned fields (ids, timestamps, links) alone, so
/// `to_info` after `apply_info` reproduces every field the info set.
pub trait InfoMapper: Validate + Clone + Debug + Send + Sync + 'static {
    type Info: DesiredInfo;

    /// Short server-side name for listings: slug, login, branch or sha.
    fn display_name(&self) -> String;

    fn to_info(&self) -> Self::Info;

    fn apply_info(&mut self, info: &Self::Info);
}

/// Return a copy of `object` with `info` applied.
#[must_use]
pub fn applied<O: InfoMapper>(object: &O, info: &O::Info) -> O {
    let mut merged = object.clone();
    merged.apply_info(info);
    merged
}

/// Whether `object` already satisfies every field set in `desired`.
#[inline]
pub fn satisfies<O: InfoMapper>(object: &O, desired: &O::Info) -> bool {
    desired.matches(&object.to_info())
}
