// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client for tracking events and updating user profiles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tally_analytics_core::{
	encode_data, EventIdentity, EventPayload, ProfileOperation, ProfilePayload, Properties,
	DURATION_PROPERTY,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::device::{apply_discovered, DeviceInfo, DeviceInfoProvider, StaticDeviceInfo};
use crate::error::{AnalyticsError, Result};
use crate::queue::{EventQueue, QueuedEvent};
use crate::store::{default_store, load_super_properties, KeyValueStore, DEFAULT_STORAGE_KEY};
use crate::timer::EventTimers;
use crate::transport::{
	normalize_base_url, DeliveryOutcome, DeliveryReport, DeliveryRequest, DeliveryTarget,
	Endpoint, HttpTransport, Transport,
};

/// Default collector base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.mixpanel.com";

/// Delivery reports buffered per subscriber before the oldest are dropped.
const DELIVERY_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for the analytics client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Collector base URL; `/track/` and `/engage/` are appended.
	pub base_url: String,
	/// Key under which super properties are persisted.
	pub storage_key: String,
	/// Timeout for each HTTP request.
	pub request_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			storage_key: DEFAULT_STORAGE_KEY.to_string(),
			request_timeout: Duration::from_secs(10),
		}
	}
}

/// Builder for constructing an AnalyticsClient.
pub struct AnalyticsClientBuilder {
	token: Option<String>,
	client_id: Option<String>,
	config: ClientConfig,
	device: Option<Arc<dyn DeviceInfoProvider>>,
	store: Option<Arc<dyn KeyValueStore>>,
	transport: Option<Arc<dyn Transport>>,
	runtime: Option<Handle>,
}

impl AnalyticsClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			token: None,
			client_id: None,
			config: ClientConfig::default(),
			device: None,
			store: None,
			transport: None,
			runtime: None,
		}
	}

	/// Sets the project token embedded in every payload.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());
		self
	}

	/// Sets the key under which super properties are persisted.
	///
	/// Defaults to `mixpanel:super:props`.
	pub fn storage_key(mut self, key: impl Into<String>) -> Self {
		self.config.storage_key = key.into();
		self
	}

	/// Sets the collector base URL.
	///
	/// Example: `https://api-eu.mixpanel.com`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.config.base_url = url.into();
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;
		self
	}

	/// Overrides the client id derived from the device provider.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}

	/// Sets the device metadata provider.
	pub fn device_info(mut self, device: Arc<dyn DeviceInfoProvider>) -> Self {
		self.device = Some(device);
		self
	}

	/// Sets the key-value store used to persist super properties.
	pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Sets the transport used to reach the collector.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets the runtime that drives initialization and deliveries.
	///
	/// Defaults to the runtime `build()` is called from.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	/// Builds the AnalyticsClient.
	///
	/// This starts environment discovery in the background. Until it completes
	/// tracked events are buffered.
	pub fn build(self) -> Result<AnalyticsClient> {
		let token = self
			.token
			.filter(|t| !t.trim().is_empty())
			.ok_or(AnalyticsError::InvalidToken)?;

		let mut config = self.config;
		config.base_url = normalize_base_url(&config.base_url)?;

		let runtime = match self.runtime {
			Some(handle) => handle,
			None => Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?,
		};

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(&config.base_url, config.request_timeout)?),
		};
		let device = self
			.device
			.unwrap_or_else(|| Arc::new(StaticDeviceInfo::from_host()));
		let store = self.store.unwrap_or_else(default_store);

		let info = device.device_info();
		let client_id = self.client_id.or_else(|| info.client_id());

		let (persist_tx, persist_rx) = mpsc::unbounded_channel();
		let writer = runtime.spawn(run_persistence_writer(Arc::clone(&store), persist_rx));
		let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);
		let (ready_tx, _) = watch::channel(false);

		let state = ClientState {
			ready: false,
			user_id: None,
			constants: info.initial_constants(),
			platform: None,
			model: None,
			super_props: Properties::new(),
			super_props_registered: false,
			timers: EventTimers::new(),
			queue: EventQueue::new(),
		};

		let inner = Arc::new(ClientInner {
			token,
			client_id,
			config,
			device,
			store,
			transport,
			runtime: runtime.clone(),
			state: Mutex::new(state),
			persist_tx: Mutex::new(Some(persist_tx)),
			writer: Mutex::new(Some(writer)),
			deliveries,
			ready_tx,
			next_sequence: AtomicU64::new(0),
			closed: AtomicBool::new(false),
		});

		runtime.spawn(initialize(Arc::clone(&inner), info));

		info!(
			base_url = %inner.config.base_url,
			storage_key = %inner.config.storage_key,
			client_id = ?inner.client_id,
			"Analytics client initialized"
		);

		Ok(AnalyticsClient { inner })
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Mutable client state. Guarded by a single lock so the ready transition and
/// the queue drain are observed atomically.
struct ClientState {
	ready: bool,
	user_id: Option<String>,
	constants: Properties,
	platform: Option<String>,
	model: Option<String>,
	super_props: Properties,
	/// Set once `register` runs; persisted values loaded later must not clobber it.
	super_props_registered: bool,
	timers: EventTimers,
	queue: EventQueue,
}

impl ClientState {
	fn current_user(&self) -> Option<&str> {
		self.user_id.as_deref().filter(|id| !id.is_empty())
	}
}

struct PersistWrite {
	key: String,
	value: String,
}

struct ClientInner {
	token: String,
	client_id: Option<String>,
	config: ClientConfig,
	device: Arc<dyn DeviceInfoProvider>,
	store: Arc<dyn KeyValueStore>,
	transport: Arc<dyn Transport>,
	runtime: Handle,
	state: Mutex<ClientState>,
	persist_tx: Mutex<Option<mpsc::UnboundedSender<PersistWrite>>>,
	writer: Mutex<Option<JoinHandle<()>>>,
	deliveries: broadcast::Sender<DeliveryReport>,
	ready_tx: watch::Sender<bool>,
	next_sequence: AtomicU64,
	closed: AtomicBool,
}

impl ClientInner {
	/// Dispatches every queued event, newest first, once the client is ready.
	/// Returns how many were dispatched. A shut down client dispatches nothing.
	fn flush_locked(&self, state: &mut ClientState) -> usize {
		if !state.ready || self.closed.load(Ordering::SeqCst) {
			return 0;
		}

		let pending: Vec<QueuedEvent> = state.queue.drain_newest_first().collect();
		let count = pending.len();
		for event in pending {
			self.dispatch_event(state, event);
		}
		count
	}

	fn dispatch_event(&self, state: &ClientState, event: QueuedEvent) {
		let identity = EventIdentity {
			distinct_id: state.current_user(),
			token: &self.token,
			client_id: self.client_id.as_deref(),
			platform: state.platform.as_deref(),
			model: state.model.as_deref(),
		};
		let payload = EventPayload::assemble(
			event.name.as_str(),
			&state.constants,
			&event.properties,
			&state.super_props,
			&identity,
		);

		let data = match encode_data(&payload) {
			Ok(data) => data,
			Err(e) => {
				warn!(event_name = %event.name, error = %e, "Dropping event that failed to encode");
				return;
			}
		};

		let target = DeliveryTarget::Event {
			name: event.name.clone(),
		};
		self.spawn_delivery(
			DeliveryRequest {
				endpoint: Endpoint::Track,
				data,
			},
			target,
			Some(event),
		);
	}

	/// Sends one request in the background and publishes its outcome.
	fn spawn_delivery(
		&self,
		request: DeliveryRequest,
		target: DeliveryTarget,
		event: Option<QueuedEvent>,
	) {
		let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
		let transport = Arc::clone(&self.transport);
		let reports = self.deliveries.clone();

		debug!(sequence, delivery = %target, "Dispatching analytics payload");

		self.runtime.spawn(async move {
			let outcome = match transport.send(request).await {
				Ok(status) => {
					if let Some(mut event) = event {
						event.mark_sent();
						debug!(
							sequence,
							event_name = %event.name,
							sent = event.is_sent(),
							status,
							"Event delivered"
						);
					}
					DeliveryOutcome::Delivered { status }
				}
				Err(e) => {
					warn!(sequence, delivery = %target, error = %e, "Analytics payload dropped");
					DeliveryOutcome::Failed {
						error: e.to_string(),
					}
				}
			};

			// No subscribers is fine.
			let _ = reports.send(DeliveryReport {
				sequence,
				target,
				outcome,
			});
		});
	}

	fn persist(&self, value: String) {
		let write = PersistWrite {
			key: self.config.storage_key.clone(),
			value,
		};

		let guard = self.persist_tx.lock();
		match guard.as_ref() {
			Some(tx) => {
				if tx.send(write).is_err() {
					warn!("Persistence writer stopped, super properties not saved");
				}
			}
			None => debug!("Client shut down, skipping super properties write"),
		}
	}
}

/// Environment discovery, run once per client.
async fn initialize(inner: Arc<ClientInner>, info: DeviceInfo) {
	let (user_agent, screen) = tokio::join!(inner.device.user_agent(), inner.device.screen_size());
	let (platform, model) = info.platform_and_model();
	let persisted = load_super_properties(inner.store.as_ref(), &inner.config.storage_key).await;

	let pending = {
		let mut state = inner.state.lock();
		apply_discovered(&mut state.constants, user_agent, screen);
		state.platform = platform;
		state.model = model;

		match persisted {
			Some(props) if !state.super_props_registered => state.super_props = props,
			Some(_) => debug!("Super properties registered before startup, ignoring persisted copy"),
			None => {}
		}

		state.ready = true;
		inner.flush_locked(&mut state)
	};

	inner.ready_tx.send_replace(true);

	info!(flushed = pending, "Analytics client ready");
}

/// Applies super property writes in the order they were issued.
async fn run_persistence_writer(
	store: Arc<dyn KeyValueStore>,
	mut rx: mpsc::UnboundedReceiver<PersistWrite>,
) {
	while let Some(write) = rx.recv().await {
		match store.set_item(&write.key, &write.value).await {
			Ok(()) => debug!(key = %write.key, "Super properties persisted"),
			Err(e) => warn!(key = %write.key, error = %e, "Failed to persist super properties"),
		}
	}
	debug!("Persistence writer stopped");
}

/// Client for tracking analytics events and updating user profiles.
///
/// Every method returns immediately. Events tracked before environment
/// discovery completes are buffered and dispatched once the client is ready.
/// Delivery is best-effort: failures are logged and published on
/// [`subscribe_deliveries`](Self::subscribe_deliveries), never returned.
///
/// # Example
///
/// ```ignore
/// use tally_analytics::{AnalyticsClient, Properties};
///
/// let client = AnalyticsClient::new("project_token")?;
///
/// client.register(Properties::new().insert("cohort", "beta"));
/// client.time_event("Checkout");
///
/// client.identify("user_123");
/// client.people_set(Properties::new().insert("plan", "pro"));
///
/// client.track("Checkout", Properties::new().insert("items", 3));
///
/// client.shutdown().await?;
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl AnalyticsClient {
	/// Creates a new builder for constructing an AnalyticsClient.
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Builds a client with default collaborators.
	pub fn new(token: impl Into<String>) -> Result<Self> {
		Self::builder().token(token).build()
	}

	/// Builds a client with default collaborators and a custom storage key.
	pub fn with_storage_key(token: impl Into<String>, storage_key: impl Into<String>) -> Result<Self> {
		Self::builder().token(token).storage_key(storage_key).build()
	}

	/// Replaces the super properties and persists them.
	///
	/// This is a full overwrite, not a merge.
	pub fn register(&self, props: Properties) {
		if !self.accepting("register") {
			return;
		}

		let serialized = serde_json::to_string(&props);
		{
			let mut state = self.inner.state.lock();
			state.super_props = props;
			state.super_props_registered = true;
		}

		match serialized {
			Ok(value) => self.inner.persist(value),
			Err(e) => warn!(error = %e, "Failed to serialize super properties"),
		}
	}

	/// Tracks an event.
	///
	/// If [`time_event`](Self::time_event) was called for `name`, the timer is
	/// consumed and `$duration` (seconds, three decimals) is added to `props`.
	pub fn track(&self, name: impl Into<String>, mut props: Properties) {
		if !self.accepting("track") {
			return;
		}

		let name = name.into();
		let now = Utc::now().timestamp_millis();

		let mut state = self.inner.state.lock();
		if let Some(duration) = state.timers.take_elapsed(&name, now) {
			props.set(DURATION_PROPERTY, duration);
		}
		state.queue.push(QueuedEvent::new(name, props));
		self.inner.flush_locked(&mut state);
	}

	/// Sets the current user id.
	pub fn identify(&self, user_id: impl Into<String>) {
		if !self.accepting("identify") {
			return;
		}

		self.inner.state.lock().user_id = Some(user_id.into());
	}

	/// Clears the current user id without falling back to the device identity.
	///
	/// Until the next `identify`, events carry no `distinct_id` and profile
	/// updates are dropped. Use [`reset`](Self::reset) to revert to the device
	/// client id instead.
	pub fn clear_identity(&self) {
		if !self.accepting("clear_identity") {
			return;
		}

		self.inner.state.lock().user_id = None;
	}

	/// Reverts to the anonymous device identity and clears the persisted
	/// super properties.
	///
	/// The in-memory super properties are left untouched, so events tracked by
	/// this client keep carrying them until the next `register`.
	pub fn reset(&self) {
		if !self.accepting("reset") {
			return;
		}

		self.inner.state.lock().user_id = self.inner.client_id.clone();
		self.inner.persist("{}".to_string());
	}

	/// Starts a timer for `name`, replacing any running timer for it.
	pub fn time_event(&self, name: impl Into<String>) {
		if !self.accepting("time_event") {
			return;
		}

		let now = Utc::now().timestamp_millis();
		self.inner.state.lock().timers.start(name, now);
	}

	/// Sets profile properties, overwriting existing values.
	pub fn people_set(&self, props: Properties) {
		self.people(ProfileOperation::Set, props.into_value());
	}

	/// Sets profile properties that are not already present.
	pub fn people_set_once(&self, props: Properties) {
		self.people(ProfileOperation::SetOnce, props.into_value());
	}

	/// Removes the named profile properties.
	pub fn people_unset<I, S>(&self, names: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let names = names.into_iter().map(|n| Value::String(n.into())).collect();
		self.people(ProfileOperation::Unset, Value::Array(names));
	}

	/// Adds numeric deltas to profile properties.
	pub fn people_increment(&self, props: Properties) {
		self.people(ProfileOperation::Add, props.into_value());
	}

	/// Appends values to list profile properties.
	pub fn people_append(&self, props: Properties) {
		self.people(ProfileOperation::Append, props.into_value());
	}

	/// Unions values into list profile properties.
	pub fn people_union(&self, props: Properties) {
		self.people(ProfileOperation::Union, props.into_value());
	}

	/// Deletes the identified user's profile.
	pub fn people_delete_user(&self) {
		self.people(ProfileOperation::Delete, Value::String(String::new()));
	}

	fn people(&self, operation: ProfileOperation, value: Value) {
		if !self.accepting("people") {
			return;
		}

		let distinct_id = match self.inner.state.lock().current_user() {
			Some(id) => id.to_string(),
			None => {
				debug!(operation = %operation, "Dropping profile update, no identified user");
				return;
			}
		};

		let payload = ProfilePayload::new(self.inner.token.as_str(), distinct_id, operation, value);
		match encode_data(&payload) {
			Ok(data) => self.inner.spawn_delivery(
				DeliveryRequest {
					endpoint: Endpoint::Engage,
					data,
				},
				DeliveryTarget::Profile { operation },
				None,
			),
			Err(e) => warn!(operation = %operation, error = %e, "Dropping profile update that failed to encode"),
		}
	}

	/// Returns true once environment discovery has completed.
	pub fn is_ready(&self) -> bool {
		self.inner.state.lock().ready
	}

	/// Waits until environment discovery has completed.
	pub async fn wait_until_ready(&self) {
		let mut rx = self.inner.ready_tx.subscribe();
		// The sender lives in `inner`, so this only errs if the client is gone.
		let _ = rx.wait_for(|ready| *ready).await;
	}

	/// Subscribes to the outcome of every delivery dispatched from now on.
	pub fn subscribe_deliveries(&self) -> broadcast::Receiver<DeliveryReport> {
		self.inner.deliveries.subscribe()
	}

	/// The project token.
	pub fn token(&self) -> &str {
		&self.inner.token
	}

	/// The device-derived client id, if the device reported one.
	pub fn client_id(&self) -> Option<&str> {
		self.inner.client_id.as_deref()
	}

	/// The current user id.
	pub fn distinct_id(&self) -> Option<String> {
		self.inner.state.lock().user_id.clone()
	}

	/// Snapshot of the in-memory super properties.
	pub fn super_properties(&self) -> Properties {
		self.inner.state.lock().super_props.clone()
	}

	/// Snapshot of the device context constants.
	pub fn context_constants(&self) -> Properties {
		self.inner.state.lock().constants.clone()
	}

	/// Number of events buffered while waiting for readiness.
	pub fn pending_len(&self) -> usize {
		self.inner.state.lock().queue.len()
	}

	/// Returns the client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Stops accepting calls and waits for queued super property writes.
	///
	/// Every later call is ignored. Events still buffered waiting for readiness
	/// are discarded and will not be sent when discovery completes. Deliveries
	/// already in flight are not awaited.
	pub async fn shutdown(&self) -> Result<()> {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		let discarded = {
			let mut state = self.inner.state.lock();
			state.timers = EventTimers::new();
			state.queue.drain_newest_first().count()
		};

		info!(discarded, "Shutting down analytics client");

		drop(self.inner.persist_tx.lock().take());

		let writer = self.inner.writer.lock().take();
		if let Some(handle) = writer {
			if let Err(e) = handle.await {
				error!(error = %e, "Persistence writer did not finish cleanly");
			}
		}

		info!("Analytics client shutdown complete");
		Ok(())
	}

	/// Returns true if the client has been shut down.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn accepting(&self, operation: &str) -> bool {
		if self.is_closed() {
			debug!(operation, "Ignoring call on shut down analytics client");
			return false;
		}
		true
	}
}
