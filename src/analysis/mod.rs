/// Data organization utilities for the basin monitoring service.
///
/// This module provides the grouping and ordering helpers the report
/// formatter relies on. Rendering to text happens only in `report`, after
/// grouping; structured values are carried all the way through.
///
/// Submodules:
/// - `groupings`: partitions alerts and readings by basin and orders them.

pub mod groupings;
