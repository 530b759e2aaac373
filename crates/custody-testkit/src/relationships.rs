//! Fake social-recovery relationship service

use async_trait::async_trait;
use custody_core::effects::{Relationships, RelationshipsService, TrustedContactKeyCertificate};
use custody_core::{CustodyError, CustodyResult, FullAccountId, RelationshipId};
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::fault::Faults;

#[derive(Debug, Default)]
struct RelationshipState {
    relationships: Relationships,
    failing: HashSet<RelationshipId>,
    removed: Vec<RelationshipId>,
}

/// Relationship service whose per-relationship calls can be made to fail.
#[derive(Debug, Default)]
pub struct FakeRelationshipsService {
    state: Mutex<RelationshipState>,
    pub faults: Faults,
}

impl FakeRelationshipsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relationships(relationships: Relationships) -> Self {
        let service = Self::default();
        service.state.lock().relationships = relationships;
        service
    }

    /// Fail endorse and remove calls for `relationship_id`.
    pub fn fail_relationship(&self, relationship_id: &RelationshipId) {
        self.state.lock().failing.insert(relationship_id.clone());
    }

    pub fn snapshot(&self) -> Relationships {
        self.state.lock().relationships.clone()
    }

    pub fn removed(&self) -> Vec<RelationshipId> {
        self.state.lock().removed.clone()
    }
}

#[async_trait]
impl RelationshipsService for FakeRelationshipsService {
    async fn relationships(&self, _account_id: &FullAccountId) -> CustodyResult<Relationships> {
        self.faults.check("relationships")?;
        Ok(self.state.lock().relationships.clone())
    }

    async fn endorse_trusted_contact(
        &self,
        _account_id: &FullAccountId,
        relationship_id: &RelationshipId,
        certificate: &TrustedContactKeyCertificate,
    ) -> CustodyResult<()> {
        self.faults.check("endorse_trusted_contact")?;
        let mut state = self.state.lock();
        if state.failing.contains(relationship_id) {
            return Err(CustodyError::network(format!("endorse {relationship_id} failed")));
        }
        let contact = state
            .relationships
            .trusted_contacts
            .iter_mut()
            .find(|c| &c.relationship_id == relationship_id)
            .ok_or_else(|| CustodyError::not_found(format!("no contact {relationship_id}")))?;
        contact.key_certificate = Some(certificate.clone());
        Ok(())
    }

    async fn remove_relationship(
        &self,
        _account_id: &FullAccountId,
        relationship_id: &RelationshipId,
    ) -> CustodyResult<()> {
        self.faults.check("remove_relationship")?;
        let mut state = self.state.lock();
        if state.failing.contains(relationship_id) {
            return Err(CustodyError::network(format!("remove {relationship_id} failed")));
        }
        state
            .relationships
            .protected_customers
            .retain(|c| &c.relationship_id != relationship_id);
        state
            .relationships
            .trusted_contacts
            .retain(|c| &c.relationship_id != relationship_id);
        state.removed.push(relationship_id.clone());
        Ok(())
    }

    async fn sync_relationships(&self, _account_id: &FullAccountId) -> CustodyResult<Relationships> {
        self.faults.check("sync_relationships")?;
        Ok(self.state.lock().relationships.clone())
    }
}
