use crate::domain::application::{ApplicationId, ApplicationStatus};
use crate::domain::disbursement::{
    DestinationDetails, Disbursement, DisbursementMethod, DisbursementStatus, estimated_delivery,
    reference_number,
};
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{
    ApplicationStoreRef, ClockRef, DisbursementStoreRef, PaymentStoreRef,
};
use crate::error::{LendingError, Result};

/// Releases approved principal after the fee has settled. Initiation is
/// staff-only and issued at most once per application; the store's
/// uniqueness guard makes the first writer win under concurrency.
pub struct DisbursementOrchestrator {
    applications: ApplicationStoreRef,
    payments: PaymentStoreRef,
    disbursements: DisbursementStoreRef,
    clock: ClockRef,
}

impl DisbursementOrchestrator {
    pub fn new(
        applications: ApplicationStoreRef,
        payments: PaymentStoreRef,
        disbursements: DisbursementStoreRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            applications,
            payments,
            disbursements,
            clock,
        }
    }

    /// Checks every precondition in order, persists the disbursement row,
    /// and moves the application to `disbursed`.
    pub async fn initiate(
        &self,
        application_id: ApplicationId,
        method: DisbursementMethod,
        details: &DestinationDetails,
        notes: Option<String>,
    ) -> Result<Disbursement> {
        // 1. The application exists and is exactly fee_paid.
        let application = self
            .applications
            .application(application_id)
            .await?
            .ok_or_else(|| LendingError::not_found("application", application_id))?;
        if application.status != ApplicationStatus::FeePaid {
            return Err(LendingError::IllegalTransition {
                from: application.status,
                to: ApplicationStatus::Disbursed,
            });
        }

        // 2. A processing fee was computed at approval time. Amounts are
        // positive by construction.
        let fee = application
            .processing_fee_amount
            .ok_or(LendingError::FeeNotSet(application_id))?;
        let principal = application
            .approved_amount
            .ok_or(LendingError::FeeNotSet(application_id))?;

        // 3. A succeeded payment covering exactly the fee, with a completion
        // timestamp.
        let settled = self
            .payments
            .settled_payment(application_id)
            .await?
            .ok_or(LendingError::PaymentNotSettled(application_id))?;
        if settled.status != PaymentStatus::Succeeded
            || settled.amount != fee
            || settled.completed_at.is_none()
        {
            return Err(LendingError::PaymentNotSettled(application_id));
        }

        // 4. No disbursement exists yet.
        if self
            .disbursements
            .disbursement(application_id)
            .await?
            .is_some()
        {
            return Err(LendingError::AlreadyDisbursed(application_id));
        }

        // 5. Method-specific destination fields are present.
        let destination = method.validate_destination(details)?;

        let today = self.clock.today();
        let disbursement = Disbursement {
            application_id,
            amount: principal,
            method,
            destination,
            estimated_delivery_date: estimated_delivery(method, today),
            reference_number: reference_number(method, today),
            status: DisbursementStatus::Initiated,
            notes,
            created_at: self.clock.now(),
        };

        // The insert carries the uniqueness guard; a concurrent initiation
        // that lost the race fails here with AlreadyDisbursed.
        let stored = self.disbursements.create_disbursement(disbursement).await?;

        if let Err(err) = self.mark_disbursed(application_id).await {
            tracing::error!(
                application_id = %application_id,
                reference = %stored.reference_number,
                error = %err,
                "disbursement row persisted but status transition failed"
            );
            return Err(err);
        }

        tracing::info!(
            application_id = %application_id,
            reference = %stored.reference_number,
            method = %method,
            delivery = %stored.estimated_delivery_date,
            "disbursement initiated"
        );
        Ok(stored)
    }

    async fn mark_disbursed(&self, application_id: ApplicationId) -> Result<()> {
        loop {
            let mut application = self
                .applications
                .application(application_id)
                .await?
                .ok_or_else(|| LendingError::not_found("application", application_id))?;
            if application.status == ApplicationStatus::Disbursed {
                return Ok(());
            }
            application.disburse(self.clock.now())?;
            match self.applications.update_application(&application).await {
                Ok(_) => return Ok(()),
                Err(LendingError::ConcurrentUpdate { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
    }
}
