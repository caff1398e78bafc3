//! Inbound face for neighbors: accepts queries and replies only from
//! configured neighbor ids and hands them to the handler.

use finder_core::{NodeId, QueryMessage, ReplyMessage};

use crate::handler::CommunicationHandler;

#[derive(Clone)]
pub struct QueryReplyService {
    handler: CommunicationHandler,
}

impl QueryReplyService {
    pub fn new(handler: CommunicationHandler) -> Self {
        Self { handler }
    }

    /// Returns false if `from` is not a known neighbor; the query is dropped.
    pub fn query(&self, from: NodeId, query: QueryMessage) -> bool {
        if !self.handler.neighbors().is_known(&from) {
            tracing::debug!(%from, msg_id = %query.msg_id, "query from unknown node dropped");
            return false;
        }
        tracing::trace!(%from, msg_id = %query.msg_id, ttl = query.time_to_live, "query accepted");
        self.handler.handle_received_query(from, query);
        true
    }

    /// Returns false if `from` is not a known neighbor; the reply is dropped.
    pub fn reply(&self, from: NodeId, reply: ReplyMessage) -> bool {
        if !self.handler.neighbors().is_known(&from) {
            tracing::debug!(%from, msg_id = %reply.msg_id, "reply from unknown node dropped");
            return false;
        }
        tracing::trace!(%from, msg_id = %reply.msg_id, ttl = reply.time_to_live, "reply accepted");
        self.handler.handle_received_reply(from, reply);
        true
    }
}
