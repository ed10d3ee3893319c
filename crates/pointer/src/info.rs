//! The capability interface shared by all points-to info providers.

use std::{any::Any, io};

use rustc_hash::FxHashSet;

use kestrel_ir::ValueRef;

use crate::oracle::AliasResult;

/// An unordered points-to set.
pub type ValueSet = FxHashSet<ValueRef>;

/// Points-to information provider. Concrete providers compute alias
/// equivalence with different algorithms; the interface is the common
/// query and composition surface.
///
/// Queries take `&mut self` because providers are free to compute lazily;
/// the first query on a value may be far more expensive than later ones.
pub trait AliasInfo {
    /// Projected alias query: [`AliasResult::MustAlias`] iff the values
    /// share a points-to set, [`AliasResult::NoAlias`] otherwise.
    fn alias(&mut self, v1: ValueRef, v2: ValueRef) -> AliasResult;

    /// The equivalence class of `v`. Empty for uninteresting values.
    fn points_to_set(&mut self, v: ValueRef) -> &ValueSet;

    /// The members of `v`'s points-to set that are allocation sites.
    fn reachable_allocation_sites(&mut self, v: ValueRef, intra_only: bool) -> ValueSet;

    /// Single-candidate form of [`Self::reachable_allocation_sites`].
    fn is_in_reachable_allocation_sites(
        &mut self,
        v: ValueRef,
        candidate: ValueRef,
        intra_only: bool,
    ) -> bool;

    /// Record that `v1` and `v2` alias, merging their classes. No-op if
    /// either value is uninteresting.
    fn introduce_alias(&mut self, v1: ValueRef, v2: ValueRef);

    /// Absorbs `other`'s equivalence classes into `self`.
    ///
    /// # Panics
    /// Alias relations computed by different algorithms cannot be merged
    /// soundly, so `other` must be the same concrete provider type (and
    /// range over the same program); anything else is fatal.
    fn merge_with(&mut self, other: &dyn AliasInfo);

    fn print(&self, w: &mut dyn io::Write) -> io::Result<()>;

    /// JSON export. Currently a stub with no schema.
    fn as_json(&self) -> serde_json::Value;

    fn print_as_json(&self, w: &mut dyn io::Write) -> io::Result<()> {
        writeln!(w, "{}", self.as_json())
    }

    fn as_any(&self) -> &dyn Any;
}
