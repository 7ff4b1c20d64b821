//! Authentication and authorization: tokens, password hashing, the request
//! pipeline, and the register/login endpoints.

pub mod handlers;
pub mod identity;
pub mod password;
pub mod pipeline;
pub mod token;

pub use pipeline::{Access, Admission, Mutation, Pipeline, Principal, RequestContext};
pub use token::{Claims, TokenService};
