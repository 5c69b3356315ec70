pub mod boundary;
pub mod boundary_loader;
pub mod reference;

pub use boundary::{district_for_point, point_in_ring, DistrictBoundary};
pub use reference::{DistrictMatch, GeographyReference};
