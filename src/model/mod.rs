pub mod binding {
    pub use trilattice_core::binding::*;
}
pub mod config {
    pub use trilattice_core::config::*;
}
pub mod error {
    pub use trilattice_core::error::*;
}
pub mod events {
    pub use trilattice_core::events::*;
}
pub mod flux {
    pub use trilattice_core::flux::*;
}
pub mod forces {
    pub use trilattice_core::forces::*;
}
pub mod lattice {
    pub use trilattice_core::lattice::*;
}
pub mod manifestation {
    pub use trilattice_core::manifestation::*;
}
pub mod metrics {
    pub use trilattice_core::metrics::*;
}
pub mod motion {
    pub use trilattice_core::motion::*;
}
pub mod neighborhood {
    pub use trilattice_core::neighborhood::*;
}
pub mod phase {
    pub use trilattice_core::phase::*;
}
pub mod snapshot {
    pub use trilattice_core::snapshot::*;
}

pub mod persistence {
    pub use trilattice_io::history::*;
    pub use trilattice_io::persistence::*;
    pub use trilattice_io::{IoError, Result};
}

pub mod state {
    pub use trilattice_data::*;
}

pub mod world;
