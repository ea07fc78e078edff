//! Checkout orchestrator.
//!
//! Cash and bank-transfer orders are saved straight away. Gateway orders are two-phase: a payment
//! intent is opened and the draft staged, then the customer returns through one of the callback
//! routes and an approved return finalizes the staged draft.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    future::Future,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use gretta::{
    cart::{CartState, store::CartStore},
    orders::{CheckoutForm, CreatedOrder, ExternalReference, GatewayPayment, OrderDraft},
    pricing::ShippingPolicy,
};
use tokio::time::timeout;
use tracing::{Span, debug, info, warn};

use crate::{
    checkout::{
        errors::{CheckoutError, Operation, ReconciliationError},
        staging::{CompletedPayment, PendingPaymentStaging, StagedPayment},
        state::CheckoutState,
    },
    orders::OrderRepository,
    payments::{CallbackUrls, GatewayCallback, PaymentIntentRequest, PaymentIntentService},
};

/// Default bound for each network call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Cart shared between the storefront and checkout.
pub type SharedCart = Arc<Mutex<CartStore>>;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Order saved; cash or bank transfer.
    Placed(CreatedOrder),

    /// Customer must be sent to the hosted payment page.
    Redirect(GatewayRedirect),
}

/// Where to send the customer to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRedirect {
    /// Gateway intent identifier
    pub intent_id: String,

    /// Hosted payment page
    pub url: String,

    /// Reference of this attempt
    pub external_reference: ExternalReference,
}

/// A rejected gateway return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    /// Status reported by the gateway
    pub status: String,

    /// Customer-facing explanation
    pub reason: &'static str,

    /// A staged draft exists, so the customer can retry without re-entering the form
    pub can_retry: bool,
}

/// A gateway return awaiting an offline payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPending {
    /// Reference of the attempt, when reported
    pub external_reference: Option<ExternalReference>,

    /// Gateway payment identifier, when reported
    pub payment_id: Option<String>,

    /// The draft is still staged
    pub staged: bool,
}

/// Turns a checkout form and the cart into a persisted order.
pub struct CheckoutOrchestrator {
    cart: SharedCart,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentIntentService>,
    staging: PendingPaymentStaging,
    callback_urls: CallbackUrls,
    policy: ShippingPolicy,
    request_timeout: Duration,
    state: Mutex<CheckoutState>,
    in_flight: AtomicBool,
}

impl Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CheckoutOrchestrator")
            .field("staging", &self.staging)
            .field("callback_urls", &self.callback_urls)
            .field("policy", &self.policy)
            .field("request_timeout", &self.request_timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Create an orchestrator with the default shipping policy and timeout.
    #[must_use]
    pub fn new(
        cart: SharedCart,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentIntentService>,
        staging: PendingPaymentStaging,
        callback_urls: CallbackUrls,
    ) -> Self {
        Self {
            cart,
            orders,
            payments,
            staging,
            callback_urls,
            policy: ShippingPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: Mutex::new(CheckoutState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Use `policy` for shipping.
    #[must_use]
    pub fn with_shipping_policy(mut self, policy: ShippingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound each network call by `request_timeout`.
    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Current checkout state.
    pub fn state(&self) -> CheckoutState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entry guard, checked once when the checkout opens.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::SubmissionInProgress`] while a submission is waiting on the
    /// network, or [`CheckoutError::EmptyCart`] when there is nothing to order.
    pub fn begin(&self) -> Result<(), CheckoutError> {
        if self.state().is_busy() {
            return Err(CheckoutError::SubmissionInProgress);
        }

        if self.cart_snapshot().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.transition(CheckoutState::Idle);

        Ok(())
    }

    /// Submit the checkout form.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] naming what failed. Validation failures never reach the
    /// network.
    #[tracing::instrument(
        name = "checkout.submit",
        skip(self, form),
        fields(
            payment_method = form.payment_method.as_str(),
            external_reference = tracing::field::Empty
        ),
        err
    )]
    pub async fn submit(&self, form: CheckoutForm) -> Result<CheckoutOutcome, CheckoutError> {
        let _guard = SubmissionGuard::acquire(&self.in_flight)?;

        self.transition(CheckoutState::Validating);

        let details = form
            .validate()
            .inspect_err(|_errors| self.transition(CheckoutState::Idle))?;

        let cart = self.cart_snapshot();

        if cart.is_empty() {
            self.transition(CheckoutState::Idle);

            return Err(CheckoutError::EmptyCart);
        }

        let draft = OrderDraft::from_checkout(details, &cart, &self.policy);

        let result = if draft.payment_method().is_gateway() {
            self.start_gateway(draft).await.map(CheckoutOutcome::Redirect)
        } else {
            self.place_direct(draft).await.map(CheckoutOutcome::Placed)
        };

        self.fail_on_error(result)
    }

    /// Open a new hosted payment for the staged draft, after a rejected payment.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError::DraftNotFound`] when nothing is staged, or the error of the
    /// new attempt.
    #[tracing::instrument(
        name = "checkout.retry_payment",
        skip(self),
        fields(external_reference = tracing::field::Empty),
        err
    )]
    pub async fn retry_payment(&self) -> Result<GatewayRedirect, CheckoutError> {
        let _guard = SubmissionGuard::acquire(&self.in_flight)?;

        let result = match self.staging.load()? {
            Some(staged) => self.start_gateway(staged.draft).await,
            None => Err(ReconciliationError::DraftNotFound.into()),
        };

        self.fail_on_error(result)
    }

    /// Handle the gateway's success return.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentNotApproved`] when the return does not report an approved
    /// payment, a [`ReconciliationError`] when it cannot be matched to the staged draft, or the
    /// error of saving the order. Staging is kept on every error.
    #[tracing::instrument(
        name = "checkout.complete_payment",
        skip(self, callback),
        fields(
            status = callback.status(),
            external_reference = ?callback.external_reference().map(ExternalReference::as_str)
        ),
        err
    )]
    pub async fn complete_payment(
        &self,
        callback: &GatewayCallback,
    ) -> Result<CreatedOrder, CheckoutError> {
        let _guard = SubmissionGuard::acquire(&self.in_flight)?;

        let result = self.finalize(callback).await;

        self.fail_on_error(result)
    }

    /// Handle the gateway's failure return. The staged draft is kept for a retry.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Staging`] if staging cannot be read.
    pub fn payment_failed(
        &self,
        callback: &GatewayCallback,
    ) -> Result<PaymentFailure, CheckoutError> {
        let can_retry = self.staging.load()?.is_some();

        warn!(
            status = callback.status(),
            status_detail = callback.status_detail(),
            "payment rejected by gateway"
        );

        self.transition(CheckoutState::Failed);

        Ok(PaymentFailure {
            status: callback.status().to_string(),
            reason: callback.rejection_reason(),
            can_retry,
        })
    }

    /// Handle the gateway's pending return. Nothing is finalized here; the backend completes the
    /// order once the offline payment clears.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Staging`] if staging cannot be read.
    pub fn payment_pending(
        &self,
        callback: &GatewayCallback,
    ) -> Result<PaymentPending, CheckoutError> {
        let staged = self.staging.load()?;

        let external_reference = callback
            .external_reference()
            .or_else(|| staged.as_ref().and_then(StagedPayment::external_reference))
            .cloned();

        info!(
            external_reference = ?external_reference.as_ref().map(ExternalReference::as_str),
            payment_id = callback.payment_id(),
            "payment pending at gateway"
        );

        if let Some(reference) = &external_reference {
            self.transition(CheckoutState::AwaitingPayment {
                external_reference: reference.clone(),
            });
        }

        Ok(PaymentPending {
            external_reference,
            payment_id: callback.payment_id().map(str::to_string),
            staged: staged.is_some(),
        })
    }

    /// Abandon the gateway attempt and drop its staged draft.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::SubmissionInProgress`] while a payment is being finalized, or
    /// [`CheckoutError::Staging`] if staging cannot be cleared.
    pub fn cancel_payment(&self) -> Result<(), CheckoutError> {
        let _guard = SubmissionGuard::acquire(&self.in_flight)?;

        self.staging.clear()?;

        info!("gateway payment cancelled");

        self.transition(CheckoutState::Idle);

        Ok(())
    }

    async fn place_direct(&self, draft: OrderDraft) -> Result<CreatedOrder, CheckoutError> {
        self.transition(CheckoutState::DirectFlow);

        let created = self
            .bounded(Operation::CreateOrder, self.orders.create_order(&draft))
            .await?
            .map_err(|source| CheckoutError::OrderPersist {
                payment_method: draft.payment_method(),
                source,
            })?;

        self.with_cart(CartStore::clear_cart);

        info!(
            order_number = %created.number,
            payment_method = draft.payment_method().as_str(),
            total = draft.total(),
            "order placed"
        );

        self.transition(CheckoutState::Success(created));

        Ok(created)
    }

    async fn start_gateway(&self, draft: OrderDraft) -> Result<GatewayRedirect, CheckoutError> {
        self.transition(CheckoutState::GatewayFlow);

        let reference = ExternalReference::generate();

        Span::current().record(
            "external_reference",
            tracing::field::display(&reference),
        );

        let draft = draft.with_external_reference(reference.clone());

        let request =
            PaymentIntentRequest::from_draft(&draft, reference.clone(), self.callback_urls.clone());

        let intent = self
            .bounded(
                Operation::CreatePaymentIntent,
                self.payments.create_payment_intent(request),
            )
            .await?
            .map_err(CheckoutError::IntentCreation)?;

        self.staging.stage(&StagedPayment {
            intent_id: intent.intent_id.clone(),
            redirect_url: intent.redirect_url.clone(),
            draft,
        })?;

        info!(intent_id = %intent.intent_id, "redirecting to gateway");

        self.transition(CheckoutState::AwaitingPayment {
            external_reference: reference.clone(),
        });

        Ok(GatewayRedirect {
            intent_id: intent.intent_id,
            url: intent.redirect_url,
            external_reference: reference,
        })
    }

    async fn finalize(&self, callback: &GatewayCallback) -> Result<CreatedOrder, CheckoutError> {
        if !callback.is_approved() {
            warn!(
                status = callback.status(),
                "success return without an approved payment"
            );

            return Err(CheckoutError::PaymentNotApproved {
                status: callback.status().to_string(),
                reason: callback.rejection_reason(),
            });
        }

        let received = callback.external_reference();

        let completed = self
            .staging
            .completed()?
            .filter(|completed| Some(&completed.external_reference) == received);

        let staged = self.staging.load()?;

        if let Some(completed) = completed {
            if staged.as_ref().and_then(StagedPayment::external_reference)
                == Some(&completed.external_reference)
            {
                self.finish_staging();
                self.with_cart(CartStore::clear_cart);
            }

            info!(
                order_number = %completed.order.number,
                "payment already finalized"
            );

            self.transition(CheckoutState::Success(completed.order));

            return Ok(completed.order);
        }

        let Some(staged) = staged else {
            warn!("approved payment has no staged order");

            return Err(ReconciliationError::DraftNotFound.into());
        };

        if let (Some(staged_reference), Some(received)) = (staged.external_reference(), received)
            && staged_reference != received
        {
            warn!(
                staged = %staged_reference,
                received = %received,
                "payment belongs to a different attempt"
            );

            return Err(ReconciliationError::ReferenceMismatch {
                staged: staged_reference.clone(),
                received: received.clone(),
            }
            .into());
        }

        let payment_id = callback
            .payment_id()
            .ok_or(ReconciliationError::MissingPaymentId)?;

        let draft = staged.draft.with_gateway_payment(GatewayPayment {
            payment_id: payment_id.to_string(),
            merchant_order_id: callback.merchant_order_id().map(str::to_string),
        });

        let created = self
            .bounded(Operation::CreateOrder, self.orders.create_order(&draft))
            .await?
            .map_err(|source| CheckoutError::OrderPersist {
                payment_method: draft.payment_method(),
                source,
            })?;

        if let Some(reference) = draft.external_reference() {
            let record = CompletedPayment {
                external_reference: reference.clone(),
                order: created,
            };

            if let Err(error) = self.staging.record_completion(&record) {
                warn!(%error, "failed to record completed payment");
            }
        }

        self.finish_staging();
        self.with_cart(CartStore::clear_cart);

        info!(
            order_number = %created.number,
            payment_id,
            total = draft.total(),
            "gateway order placed"
        );

        self.transition(CheckoutState::Success(created));

        Ok(created)
    }

    fn finish_staging(&self) {
        if let Err(error) = self.staging.clear() {
            warn!(%error, "failed to clear staged order");
        }
    }

    async fn bounded<T, E>(
        &self,
        operation: Operation,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<Result<T, E>, CheckoutError> {
        timeout(self.request_timeout, call)
            .await
            .map_err(|_elapsed| {
                warn!(%operation, timeout = ?self.request_timeout, "network call timed out");

                CheckoutError::Timeout { operation }
            })
    }

    fn fail_on_error<T>(&self, result: Result<T, CheckoutError>) -> Result<T, CheckoutError> {
        if let Err(error) = &result
            && !matches!(
                error,
                CheckoutError::Validation(_)
                    | CheckoutError::EmptyCart
                    | CheckoutError::SubmissionInProgress
            )
        {
            self.transition(CheckoutState::Failed);
        }

        result
    }

    fn cart_snapshot(&self) -> CartState {
        self.with_cart(|cart| cart.get_state().clone())
    }

    fn with_cart<R>(&self, f: impl FnOnce(&mut CartStore) -> R) -> R {
        let mut cart = self.cart.lock().unwrap_or_else(PoisonError::into_inner);

        f(&mut cart)
    }

    fn transition(&self, to: CheckoutState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(from = state.name(), to = to.name(), "checkout state");

        *state = to;
    }
}

/// Marks a submission as in flight until dropped.
struct SubmissionGuard<'a>(&'a AtomicBool);

impl<'a> SubmissionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CheckoutError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_previous| Self(flag))
            .map_err(|_previous| CheckoutError::SubmissionInProgress)
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use gretta::{
        orders::{Order, OrderId, OrderNumber, OrderStatus, PaymentMethod},
        storage::{KeyValueStore, MemoryStore},
    };
    use testresult::TestResult;

    use crate::{
        orders::{MockOrderRepository, OrderRepositoryError},
        payments::{
            MockPaymentIntentService, PaymentIntent, PaymentIntentError, SHIPPING_LINE_TITLE,
        },
        test::fixtures,
    };

    use super::*;

    struct Harness {
        cart: SharedCart,
        storage: Arc<MemoryStore>,
        staging: PendingPaymentStaging,
    }

    impl Harness {
        fn new(lines: &[(&str, u64, i64)]) -> Self {
            let storage = Arc::new(MemoryStore::new());

            Self {
                cart: Arc::new(Mutex::new(fixtures::cart_store(lines))),
                staging: PendingPaymentStaging::new(storage.clone()),
                storage,
            }
        }

        fn orchestrator(
            &self,
            orders: Arc<dyn OrderRepository>,
            payments: Arc<dyn PaymentIntentService>,
        ) -> CheckoutOrchestrator {
            CheckoutOrchestrator::new(
                self.cart.clone(),
                orders,
                payments,
                self.staging.clone(),
                CallbackUrls::for_app("http://localhost:5173"),
            )
        }

        fn cart_lines(&self) -> usize {
            self.cart
                .lock()
                .map(|cart| cart.get_state().line_count())
                .unwrap_or_default()
        }
    }

    fn intent(id: &str) -> PaymentIntent {
        PaymentIntent {
            intent_id: id.to_string(),
            redirect_url: format!("https://gateway.test/checkout?pref_id={id}"),
        }
    }

    fn approved(reference: &ExternalReference, payment_id: &str) -> GatewayCallback {
        GatewayCallback::from_pairs([
            ("status".to_string(), "approved".to_string()),
            ("payment_id".to_string(), payment_id.to_string()),
            ("merchant_order_id".to_string(), "555".to_string()),
            (
                "external_reference".to_string(),
                reference.as_str().to_string(),
            ),
        ])
    }

    fn rejected(reference: &ExternalReference) -> GatewayCallback {
        GatewayCallback::from_pairs([
            ("status".to_string(), "rejected".to_string()),
            (
                "status_detail".to_string(),
                "cc_rejected_insufficient_amount".to_string(),
            ),
            ("payment_id".to_string(), "992".to_string()),
            (
                "external_reference".to_string(),
                reference.as_str().to_string(),
            ),
        ])
    }

    fn redirect(outcome: CheckoutOutcome) -> Result<GatewayRedirect, String> {
        match outcome {
            CheckoutOutcome::Redirect(redirect) => Ok(redirect),
            CheckoutOutcome::Placed(created) => {
                Err(format!("expected a redirect, got {created:?}"))
            }
        }
    }

    #[tokio::test]
    async fn cash_order_is_created_and_cart_cleared() -> TestResult {
        let harness = Harness::new(&[("Medialuna", 700, 6)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        orders
            .expect_create_order()
            .once()
            .withf(|draft| {
                draft.payment_method() == PaymentMethod::Cash
                    && draft.total() == 4200
                    && !draft.is_paid()
            })
            .return_once(|_| Ok(fixtures::created(101)));

        payments.expect_create_payment_intent().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        orchestrator.begin()?;

        let outcome = orchestrator.submit(fixtures::form(PaymentMethod::Cash)).await?;

        assert!(
            matches!(
                outcome,
                CheckoutOutcome::Placed(created) if created.number == OrderNumber(101)
            ),
            "expected a placed order, got {outcome:?}"
        );
        assert_eq!(harness.cart_lines(), 0);
        assert!(matches!(orchestrator.state(), CheckoutState::Success(_)));
        assert!(!orchestrator.state().is_busy());

        Ok(())
    }

    #[tokio::test]
    async fn bank_transfer_takes_the_direct_path() -> TestResult {
        let harness = Harness::new(&[("Chocotorta", 22000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        orders
            .expect_create_order()
            .once()
            .withf(|draft| draft.payment_method() == PaymentMethod::BankTransfer)
            .return_once(|_| Ok(fixtures::created(102)));

        payments.expect_create_payment_intent().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let outcome = orchestrator
            .submit(fixtures::form(PaymentMethod::BankTransfer))
            .await?;

        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));

        Ok(())
    }

    #[tokio::test]
    async fn failed_direct_order_keeps_the_cart() {
        let harness = Harness::new(&[("Medialuna", 700, 6)]);

        let mut orders = MockOrderRepository::new();

        orders
            .expect_create_order()
            .once()
            .return_once(|_| Err(OrderRepositoryError::UnexpectedResponse("down".to_string())));

        let orchestrator =
            harness.orchestrator(Arc::new(orders), Arc::new(MockPaymentIntentService::new()));

        let result = orchestrator.submit(fixtures::form(PaymentMethod::Cash)).await;

        assert!(
            matches!(
                &result,
                Err(error @ CheckoutError::OrderPersist { .. }) if error.is_retryable()
            ),
            "expected a retryable OrderPersist, got {result:?}"
        );
        assert_eq!(harness.cart_lines(), 1);
        assert_eq!(orchestrator.state(), CheckoutState::Failed);
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_collaborators() {
        let harness = Harness::new(&[("Helado", 4500, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        orders.expect_create_order().never();
        payments.expect_create_payment_intent().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let result = orchestrator
            .submit(fixtures::delivery_form(PaymentMethod::Gateway, ""))
            .await;

        assert!(
            matches!(
                &result,
                Err(CheckoutError::Validation(errors))
                    if errors.for_field(gretta::orders::Field::Address).is_some()
            ),
            "expected an address validation error, got {result:?}"
        );
        assert_eq!(orchestrator.state(), CheckoutState::Idle);
        assert!(matches!(harness.staging.load(), Ok(None)));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let harness = Harness::new(&[]);

        let mut orders = MockOrderRepository::new();

        orders.expect_create_order().never();

        let orchestrator =
            harness.orchestrator(Arc::new(orders), Arc::new(MockPaymentIntentService::new()));

        assert!(matches!(orchestrator.begin(), Err(CheckoutError::EmptyCart)));

        let result = orchestrator.submit(fixtures::form(PaymentMethod::Cash)).await;

        assert!(
            matches!(result, Err(CheckoutError::EmptyCart)),
            "expected EmptyCart, got {result:?}"
        );
    }

    #[tokio::test]
    async fn approved_gateway_payment_creates_order_once() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .withf(|request| {
                request.external_reference.as_str().starts_with("GRT-")
                    && request.line_items.len() == 1
                    && request.callback_urls.success == "http://localhost:5173/checkout/success"
            })
            .return_once(|_| Ok(intent("X")));

        orders
            .expect_create_order()
            .once()
            .withf(|draft| {
                draft
                    .gateway_payment()
                    .is_some_and(|payment| payment.payment_id == "991")
                    && draft.is_paid()
            })
            .return_once(|_| Ok(fixtures::created(103)));

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let redirect = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        assert_eq!(redirect.intent_id, "X");

        let staged = harness.staging.load()?;

        assert_eq!(
            staged.as_ref().and_then(StagedPayment::external_reference),
            Some(&redirect.external_reference)
        );
        assert_eq!(harness.cart_lines(), 1);

        let created = orchestrator
            .complete_payment(&approved(&redirect.external_reference, "991"))
            .await?;

        assert_eq!(created.number, OrderNumber(103));
        assert_eq!(harness.staging.load()?, None);
        assert_eq!(harness.cart_lines(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn rejected_gateway_payment_keeps_staging_and_cart() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        orders.expect_create_order().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let redirect = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        let result = orchestrator
            .complete_payment(&rejected(&redirect.external_reference))
            .await;

        assert!(
            matches!(
                &result,
                Err(CheckoutError::PaymentNotApproved { status, .. }) if status == "rejected"
            ),
            "expected PaymentNotApproved, got {result:?}"
        );
        assert!(harness.staging.load()?.is_some());
        assert_eq!(harness.cart_lines(), 1);

        let failure = orchestrator.payment_failed(&rejected(&redirect.external_reference))?;

        assert_eq!(failure.reason, "insufficient funds on the card");
        assert!(failure.can_retry);
        assert!(harness.staging.load()?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn intent_failure_stages_nothing() {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| {
                Err(PaymentIntentError::Rejected {
                    status: 401,
                    message: "access token rejected".to_string(),
                })
            });

        orders.expect_create_order().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let result = orchestrator
            .submit(fixtures::form(PaymentMethod::Gateway))
            .await;

        assert!(
            matches!(result, Err(CheckoutError::IntentCreation(_))),
            "expected IntentCreation, got {result:?}"
        );
        assert!(matches!(harness.staging.load(), Ok(None)));
        assert_eq!(orchestrator.state(), CheckoutState::Failed);
    }

    #[tokio::test]
    async fn delivery_shipping_is_sent_as_a_line() -> TestResult {
        let harness = Harness::new(&[("Torta", 2000, 2)]);

        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .withf(|request| {
                request
                    .line_items
                    .last()
                    .is_some_and(|line| line.title == SHIPPING_LINE_TITLE && line.unit_price == 500)
                    && request.total() == 4500
            })
            .return_once(|_| Ok(intent("Y")));

        let orchestrator =
            harness.orchestrator(Arc::new(MockOrderRepository::new()), Arc::new(payments));

        orchestrator
            .submit(fixtures::delivery_form(
                PaymentMethod::Gateway,
                "Av. Colón 1234, Córdoba",
            ))
            .await?;

        let staged = harness.staging.load()?;

        assert_eq!(staged.map(|staged| staged.draft.total()), Some(4500));

        Ok(())
    }

    #[tokio::test]
    async fn repeated_success_return_resolves_to_the_same_order() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        orders
            .expect_create_order()
            .once()
            .return_once(|_| Ok(fixtures::created(104)));

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let redirect = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        let callback = approved(&redirect.external_reference, "991");

        let first = orchestrator.complete_payment(&callback).await?;
        let second = orchestrator.complete_payment(&callback).await?;

        assert_eq!(first, second);

        Ok(())
    }

    #[tokio::test]
    async fn approved_return_without_staging_needs_reconciliation() {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();

        orders.expect_create_order().never();

        let orchestrator =
            harness.orchestrator(Arc::new(orders), Arc::new(MockPaymentIntentService::new()));

        let result = orchestrator
            .complete_payment(&approved(&ExternalReference::new("GRT-lost"), "991"))
            .await;

        assert!(
            matches!(
                &result,
                Err(error @ CheckoutError::Reconciliation(ReconciliationError::DraftNotFound))
                    if !error.is_retryable()
            ),
            "expected DraftNotFound, got {result:?}"
        );
        assert_eq!(harness.cart_lines(), 1);
    }

    #[tokio::test]
    async fn return_for_another_attempt_is_rejected() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        orders.expect_create_order().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        orchestrator
            .submit(fixtures::form(PaymentMethod::Gateway))
            .await?;

        let result = orchestrator
            .complete_payment(&approved(&ExternalReference::new("GRT-other"), "991"))
            .await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::Reconciliation(
                    ReconciliationError::ReferenceMismatch { .. }
                ))
            ),
            "expected ReferenceMismatch, got {result:?}"
        );
        assert!(harness.staging.load()?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn failed_save_after_payment_can_be_retried() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        let mut attempts = 0;

        orders.expect_create_order().times(2).returning(move |_| {
            attempts += 1;

            if attempts == 1 {
                Err(OrderRepositoryError::UnexpectedResponse("down".to_string()))
            } else {
                Ok(fixtures::created(105))
            }
        });

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let redirect = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        let callback = approved(&redirect.external_reference, "991");

        let result = orchestrator.complete_payment(&callback).await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::OrderPersist {
                    payment_method: PaymentMethod::Gateway,
                    ..
                })
            ),
            "expected OrderPersist, got {result:?}"
        );
        assert!(harness.staging.load()?.is_some());
        assert_eq!(harness.cart_lines(), 1);

        let created = orchestrator.complete_payment(&callback).await?;

        assert_eq!(created.number, OrderNumber(105));
        assert_eq!(harness.staging.load()?, None);

        Ok(())
    }

    #[tokio::test]
    async fn pending_return_keeps_staging() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        orders.expect_create_order().never();

        let orchestrator = harness.orchestrator(Arc::new(orders), Arc::new(payments));

        let redirect = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        let callback = GatewayCallback::from_query(&format!(
            "status=pending&payment_id=993&external_reference={}",
            redirect.external_reference
        ))?;

        let pending = orchestrator.payment_pending(&callback)?;

        assert!(pending.staged);
        assert_eq!(pending.payment_id.as_deref(), Some("993"));
        assert_eq!(
            orchestrator.state(),
            CheckoutState::AwaitingPayment {
                external_reference: redirect.external_reference
            }
        );
        assert!(harness.staging.load()?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn cancel_clears_staging() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut payments = MockPaymentIntentService::new();

        payments
            .expect_create_payment_intent()
            .once()
            .return_once(|_| Ok(intent("X")));

        let orchestrator =
            harness.orchestrator(Arc::new(MockOrderRepository::new()), Arc::new(payments));

        orchestrator
            .submit(fixtures::form(PaymentMethod::Gateway))
            .await?;

        orchestrator.cancel_payment()?;

        assert_eq!(harness.staging.load()?, None);
        assert_eq!(harness.cart_lines(), 1);
        assert_eq!(orchestrator.state(), CheckoutState::Idle);

        Ok(())
    }

    #[tokio::test]
    async fn retry_opens_a_new_intent_for_the_staged_draft() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let mut payments = MockPaymentIntentService::new();
        let mut intents = 0;

        payments
            .expect_create_payment_intent()
            .times(2)
            .returning(move |_| {
                intents += 1;
                Ok(intent(&format!("pref-{intents}")))
            });

        let orchestrator =
            harness.orchestrator(Arc::new(MockOrderRepository::new()), Arc::new(payments));

        let first = redirect(
            orchestrator
                .submit(fixtures::form(PaymentMethod::Gateway))
                .await?,
        )?;

        let second = orchestrator.retry_payment().await?;

        assert_eq!(second.intent_id, "pref-2");
        assert_ne!(first.external_reference, second.external_reference);
        assert_eq!(
            harness
                .staging
                .load()?
                .as_ref()
                .and_then(StagedPayment::external_reference),
            Some(&second.external_reference)
        );

        Ok(())
    }

    #[tokio::test]
    async fn retry_without_staging_needs_reconciliation() {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        let orchestrator = harness.orchestrator(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockPaymentIntentService::new()),
        );

        let result = orchestrator.retry_payment().await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::Reconciliation(ReconciliationError::DraftNotFound))
            ),
            "expected DraftNotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn unreadable_staging_is_treated_as_missing() -> TestResult {
        let harness = Harness::new(&[("Helado 1kg", 8000, 1)]);

        harness
            .storage
            .set(crate::checkout::staging::PENDING_ORDER_KEY, "not json")?;

        let orchestrator = harness.orchestrator(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockPaymentIntentService::new()),
        );

        let result = orchestrator
            .complete_payment(&approved(&ExternalReference::new("GRT-1"), "991"))
            .await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::Reconciliation(ReconciliationError::DraftNotFound))
            ),
            "expected DraftNotFound, got {result:?}"
        );

        Ok(())
    }

    #[derive(Debug)]
    struct SlowOrders {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowOrders {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OrderRepository for SlowOrders {
        async fn create_order(
            &self,
            _draft: &OrderDraft,
        ) -> Result<CreatedOrder, OrderRepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            Ok(fixtures::created(200))
        }

        async fn get_order_by_number(
            &self,
            _number: OrderNumber,
        ) -> Result<Order, OrderRepositoryError> {
            Err(OrderRepositoryError::NotFound)
        }

        async fn update_order_status(
            &self,
            _id: OrderId,
            _status: OrderStatus,
        ) -> Result<Order, OrderRepositoryError> {
            Err(OrderRepositoryError::NotFound)
        }

        async fn list_orders(
            &self,
            _status: Option<OrderStatus>,
        ) -> Result<Vec<Order>, OrderRepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let harness = Harness::new(&[("Medialuna", 700, 6)]);
        let orders = SlowOrders::new(Duration::from_secs(60));

        let orchestrator = harness
            .orchestrator(orders.clone(), Arc::new(MockPaymentIntentService::new()))
            .with_timeout(Duration::from_secs(15));

        let result = orchestrator.submit(fixtures::form(PaymentMethod::Cash)).await;

        assert!(
            matches!(
                &result,
                Err(error @ CheckoutError::Timeout { operation: Operation::CreateOrder })
                    if error.is_retryable()
            ),
            "expected a CreateOrder timeout, got {result:?}"
        );
        assert_eq!(harness.cart_lines(), 1);
        assert_eq!(orchestrator.state(), CheckoutState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_in_flight_is_refused() {
        let harness = Harness::new(&[("Medialuna", 700, 6)]);
        let orders = SlowOrders::new(Duration::from_secs(1));

        let orchestrator =
            harness.orchestrator(orders.clone(), Arc::new(MockPaymentIntentService::new()));

        let (first, second) = tokio::join!(
            orchestrator.submit(fixtures::form(PaymentMethod::Cash)),
            orchestrator.submit(fixtures::form(PaymentMethod::Cash)),
        );

        assert!(
            matches!(first, Ok(CheckoutOutcome::Placed(_))),
            "expected the first submit to succeed, got {first:?}"
        );
        assert!(
            matches!(second, Err(CheckoutError::SubmissionInProgress)),
            "expected SubmissionInProgress, got {second:?}"
        );
        assert_eq!(orders.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_while_in_flight_keeps_the_flow() {
        let harness = Harness::new(&[("Medialuna", 700, 6)]);
        let orders = SlowOrders::new(Duration::from_secs(1));

        let orchestrator =
            harness.orchestrator(orders.clone(), Arc::new(MockPaymentIntentService::new()));

        let (placed, reopened) = tokio::join!(
            orchestrator.submit(fixtures::form(PaymentMethod::Cash)),
            async { orchestrator.begin() },
        );

        assert!(
            matches!(reopened, Err(CheckoutError::SubmissionInProgress)),
            "expected SubmissionInProgress, got {reopened:?}"
        );
        assert!(
            matches!(placed, Ok(CheckoutOutcome::Placed(_))),
            "expected the submit to finish, got {placed:?}"
        );
        assert!(
            matches!(orchestrator.state(), CheckoutState::Success(_)),
            "expected Success, got {:?}",
            orchestrator.state()
        );
    }
}
