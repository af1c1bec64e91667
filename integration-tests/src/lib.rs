//! Toy general-aviation sizing disciplines shared by the integration tests.

pub mod general_aviation;
