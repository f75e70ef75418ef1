//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP, bound to localhost.

use crate::handler::{
    RpcHandler, METHOD_DELIVERY_STATS, METHOD_SUBSCRIPTION_STATS, METHOD_TEST_WEBHOOK,
};
use crate::types::{DeliveryStatsRequest, SubscriptionStatsRequest, TestWebhookRequest};
use hookline_core::error::{AppError, Result};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to build server on {}: {}", addr, e)))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(format!("Failed to read bound address: {}", e)))?;

        let mut module = RpcModule::new(());

        // Register methods
        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_TEST_WEBHOOK, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TestWebhookRequest = params.parse()?;
                    handler.test_webhook(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_SUBSCRIPTION_STATS, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubscriptionStatsRequest = params.parse()?;
                    handler.subscription_stats(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_DELIVERY_STATS, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DeliveryStatsRequest = params.parse()?;
                    handler.delivery_stats(req).await
                }
            })
            .map_err(register_error)?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}

fn register_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Failed to register RPC method: {}", e))
}
