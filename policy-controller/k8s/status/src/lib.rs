#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod aggregate;
mod index;


pub use self::{
    aggregate::{aggregate, MAX_ANCESTORS},
    index::{
        Controller, ControllerMetrics, Index, IndexMetrics, PolicyRef, PolicyResource,
        SharedIndex, Update,
    },
};
