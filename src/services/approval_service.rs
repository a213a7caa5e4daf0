use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::approval::ApprovalRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    Cancel,
}

impl Decision {
    pub fn resulting_status(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
            Decision::Cancel => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionRequest {
    pub comment: Option<String>,
}

/// Only pending requests can be decided. Requesters cannot approve or reject
/// their own request, and only the requester may cancel it.
pub fn check_decision(request: &ApprovalRequest, actor: Uuid, decision: Decision) -> ServiceResult<()> {
    if request.status != "pending" {
        return Err(ServiceError::InvalidState(format!(
            "Approval request {} is already {}",
            request.id, request.status
        )));
    }
    let is_requester = request.created_by == Some(actor);
    match decision {
        Decision::Approve | Decision::Reject if is_requester => {
            Err(ServiceError::Forbidden("Requesters cannot decide their own approval request".to_string()))
        }
        Decision::Cancel if !is_requester => {
            Err(ServiceError::Forbidden("Only the requester can cancel an approval request".to_string()))
        }
        _ => Ok(()),
    }
}

pub struct ApprovalService {
    pool: PgPool,
    organization_id: Uuid,
}

impl ApprovalService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    pub async fn decide(
        &self,
        id: Uuid,
        actor: Uuid,
        decision: Decision,
        input: DecisionRequest,
    ) -> ServiceResult<ApprovalRequest> {
        let mut tx = self.pool.begin().await?;
        let request = sqlx::query_as::<_, ApprovalRequest>(&format!(
            "SELECT {} FROM approval_requests WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL FOR UPDATE",
            ApprovalRequest::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Approval request {} not found", id)))?;

        if let Err(e) = check_decision(&request, actor, decision) {
            if matches!(e, ServiceError::Forbidden(_)) {
                tracing::warn!(approval_request_id = %id, user_id = %actor, ?decision, "Approval decision refused");
            }
            return Err(e);
        }

        let updated = sqlx::query_as::<_, ApprovalRequest>(&format!(
            "UPDATE approval_requests SET status = $3, decided_by = $4, decided_at = now(), decision_comment = $5, \
             updated_at = now(), updated_by = $4 WHERE organization_id = $1 AND id = $2 RETURNING {}",
            ApprovalRequest::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(id)
        .bind(decision.resulting_status())
        .bind(actor)
        .bind(input.comment)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(approval_request_id = %id, status = %updated.status, "Approval request decided");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: &str, requester: Uuid) -> ApprovalRequest {
        ApprovalRequest {
            id: Uuid::new_v4(),
            request_type: "leave".into(),
            subject_table: None,
            subject_id: None,
            summary: Some("Two weeks off".into()),
            status: status.into(),
            decided_by: None,
            decided_at: None,
            decision_comment: None,
            created_at: chrono::Utc::now(),
            created_by: Some(requester),
        }
    }

    #[test]
    fn manager_decides_requester_cancels() {
        let requester = Uuid::new_v4();
        let manager = Uuid::new_v4();
        let pending = request("pending", requester);

        assert!(check_decision(&pending, manager, Decision::Approve).is_ok());
        assert!(check_decision(&pending, manager, Decision::Reject).is_ok());
        assert!(check_decision(&pending, requester, Decision::Cancel).is_ok());

        assert!(matches!(check_decision(&pending, requester, Decision::Approve), Err(ServiceError::Forbidden(_))));
        assert!(matches!(check_decision(&pending, manager, Decision::Cancel), Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn decided_requests_are_final() {
        let requester = Uuid::new_v4();
        for status in ["approved", "rejected", "cancelled"] {
            let done = request(status, requester);
            assert!(matches!(
                check_decision(&done, Uuid::new_v4(), Decision::Approve),
                Err(ServiceError::InvalidState(_))
            ));
        }
        assert_eq!(Decision::Reject.resulting_status(), "rejected");
    }
}
