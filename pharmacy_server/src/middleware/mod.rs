mod acl;
mod identity;
mod signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use identity::{Caller, IdentityMiddlewareFactory, IdentityMiddlewareService, USER_ID_HEADER, USER_ROLE_HEADER};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService};
