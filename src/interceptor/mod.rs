//! Feed request interception
//!
//! Every request passes straight through to the next handler. Requests for a
//! tracked feed path additionally emit one analytics data point in the
//! background; the response never waits on it and never sees its outcome.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error};

use crate::analytics::{
    extract_visitor_metadata, AnalyticsRecord, AnalyticsSink, BackgroundTasks, GeoIpService,
};
use crate::config::{AnalyticsConfig, TrackedPaths};

pub struct RequestInterceptor {
    tracked_paths: Arc<TrackedPaths>,
    config: AnalyticsConfig,
    sink: Option<Arc<dyn AnalyticsSink>>,
    background_tasks: Option<BackgroundTasks>,
    geoip: Option<GeoIpService>,
}

impl RequestInterceptor {
    /// An interceptor with no sink: every request is a plain pass-through
    pub fn new(tracked_paths: Arc<TrackedPaths>, config: AnalyticsConfig) -> Self {
        Self {
            tracked_paths,
            config,
            sink: None,
            background_tasks: None,
            geoip: None,
        }
    }

    pub fn with_sink(mut self, sink: Option<Arc<dyn AnalyticsSink>>) -> Self {
        self.sink = sink;
        self
    }

    /// Register writes here instead of spawning them fully detached
    pub fn with_background_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.background_tasks = Some(tasks);
        self
    }

    pub fn with_geoip(mut self, geoip: Option<GeoIpService>) -> Self {
        self.geoip = geoip;
        self
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.tracked_paths.contains(path)
    }

    /// Build and dispatch the data point for a tracked path.
    ///
    /// Returns immediately; the sink write runs on its own task.
    pub fn record(&self, path: &str, headers: &HeaderMap, socket_ip: Option<IpAddr>) {
        let Some(sink) = &self.sink else {
            debug!(path, "No analytics sink configured, skipping data point");
            return;
        };

        let meta = extract_visitor_metadata(headers, socket_ip, &self.config, self.geoip.as_ref());
        let record = AnalyticsRecord::from_visit(path, &meta);

        let sink = Arc::clone(sink);
        let path = path.to_string();
        let write = async move {
            if let Err(err) = sink.write_data_point(record).await {
                error!(path = %path, error = %err, "Feed analytics write failed");
            }
        };

        match &self.background_tasks {
            Some(tasks) => tasks.spawn(write),
            None => {
                tokio::spawn(write);
            }
        }
    }
}

/// Middleware entry point: record tracked fetches, then run the rest of the pipeline
pub async fn intercept(
    State(interceptor): State<Arc<RequestInterceptor>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if interceptor.is_tracked(request.uri().path()) {
        let socket_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        interceptor.record(request.uri().path(), request.headers(), socket_ip);
    }

    next.run(request).await
}
