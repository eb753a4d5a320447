//! Testing utilities and harness for weave

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use weave_core::prelude::*;
}
