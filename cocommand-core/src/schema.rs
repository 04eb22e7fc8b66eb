//! JSON schemas of the wire types, for clients written against the protocol
//! in other languages.

use crate::domain::{
    Actor, ActorMeta, ApprovalRequest, ApprovalResponse, SessionMessage, StateEnvelope,
};
use schemars::schema::RootSchema;
use schemars::schema_for;

/// Name and schema of every type that crosses the wire
pub fn wire_schemas() -> Vec<(&'static str, RootSchema)> {
    vec![
        ("session_message", schema_for!(SessionMessage)),
        ("state_envelope", schema_for!(StateEnvelope)),
        ("approval_request", schema_for!(ApprovalRequest)),
        ("approval_response", schema_for!(ApprovalResponse)),
        ("actor", schema_for!(Actor)),
        ("actor_meta", schema_for!(ActorMeta)),
    ]
}
