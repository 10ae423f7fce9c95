use crate::{
    command_executor::CommandExecutor,
    orchestrator::Orchestrator,
    response::handle_service_result,
    types::{HotspotConfig, NetworkConfigRequest, NtpConfig, WifiJoinRequest},
};
use actix_web::{HttpResponse, Responder, web};
use log::{debug, error};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    interface: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityQuery {
    host: String,
}

pub struct Api<Executor>
where
    Executor: CommandExecutor,
{
    pub orchestrator: Arc<Orchestrator<Executor>>,
}

impl<Executor> Clone for Api<Executor>
where
    Executor: CommandExecutor,
{
    fn clone(&self) -> Self {
        Api {
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<Executor> Api<Executor>
where
    Executor: CommandExecutor + 'static,
{
    pub fn new(orchestrator: Orchestrator<Executor>) -> Self {
        Api {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Register every route on `cfg`.
    pub fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/version", web::get().to(Self::version))
            .route("/healthcheck", web::get().to(Self::healthcheck))
            .route("/network", web::post().to(Self::configure_interface))
            .route("/network/interfaces", web::get().to(Self::list_interfaces))
            .route(
                "/network/interfaces/wifi",
                web::get().to(Self::list_wifi_interfaces),
            )
            .route(
                "/network/interfaces/{name}",
                web::get().to(Self::get_interface),
            )
            .route(
                "/network/profiles/{name}",
                web::get().to(Self::get_bound_profile_config),
            )
            .route("/wifi/connect", web::post().to(Self::connect_wifi))
            .route("/wifi/disconnect", web::post().to(Self::disconnect_wifi))
            .route("/wifi/scan", web::get().to(Self::scan_wifi))
            .route("/hotspot", web::get().to(Self::get_hotspot_status))
            .route("/hotspot", web::post().to(Self::configure_hotspot))
            .route("/ntp", web::get().to(Self::get_ntp_status))
            .route("/ntp", web::post().to(Self::configure_ntp))
            .route(
                "/ntp/connectivity",
                web::get().to(Self::check_ntp_connectivity),
            );
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(format!(
            "{} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHORT_REV")
        ))
    }

    pub async fn healthcheck(api: web::Data<Self>) -> impl Responder {
        debug!("healthcheck() called");

        match api.orchestrator.healthcheck().await {
            Ok(true) => HttpResponse::Ok().finish(),
            Ok(false) => HttpResponse::ServiceUnavailable().body("network manager is not running"),
            Err(e) => {
                error!("healthcheck failed: {e:#}");
                HttpResponse::InternalServerError().body(e.to_string())
            }
        }
    }

    pub async fn list_interfaces(api: web::Data<Self>) -> impl Responder {
        debug!("list_interfaces() called");
        handle_service_result(
            api.orchestrator.list_interfaces().await,
            "list_interfaces",
        )
    }

    pub async fn list_wifi_interfaces(api: web::Data<Self>) -> impl Responder {
        debug!("list_wifi_interfaces() called");
        handle_service_result(
            api.orchestrator.list_wifi_interfaces().await,
            "list_wifi_interfaces",
        )
    }

    pub async fn get_interface(name: web::Path<String>, api: web::Data<Self>) -> impl Responder {
        debug!("get_interface() called: {name}");

        match api.orchestrator.get_interface(&name).await {
            Ok(None) => HttpResponse::NotFound().body(format!("interface {name} not found")),
            result => handle_service_result(result, "get_interface"),
        }
    }

    pub async fn get_bound_profile_config(
        name: web::Path<String>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("get_bound_profile_config() called: {name}");

        match api.orchestrator.get_bound_profile_config(&name).await {
            Ok(None) => HttpResponse::NotFound().body(format!("profile {name} not found")),
            result => handle_service_result(result, "get_bound_profile_config"),
        }
    }

    pub async fn configure_interface(
        body: web::Json<NetworkConfigRequest>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("configure_interface() called: {body:?}");
        handle_service_result(
            api.orchestrator.configure_interface(&body).await,
            "configure_interface",
        )
    }

    pub async fn connect_wifi(
        body: web::Json<WifiJoinRequest>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("connect_wifi() called: {}", body.ssid);
        handle_service_result(api.orchestrator.connect_wifi(&body).await, "connect_wifi")
    }

    pub async fn disconnect_wifi(api: web::Data<Self>) -> impl Responder {
        debug!("disconnect_wifi() called");
        handle_service_result(
            api.orchestrator.disconnect_wifi().await,
            "disconnect_wifi",
        )
    }

    pub async fn scan_wifi(query: web::Query<ScanQuery>, api: web::Data<Self>) -> impl Responder {
        debug!("scan_wifi() called: {query:?}");
        handle_service_result(
            api.orchestrator
                .scan_wifi(query.interface.as_deref())
                .await,
            "scan_wifi",
        )
    }

    pub async fn get_hotspot_status(api: web::Data<Self>) -> impl Responder {
        debug!("get_hotspot_status() called");
        handle_service_result(
            api.orchestrator.get_hotspot_status().await,
            "get_hotspot_status",
        )
    }

    pub async fn configure_hotspot(
        body: web::Json<HotspotConfig>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!(
            "configure_hotspot() called: enabled={} ssid={}",
            body.enabled, body.ssid
        );
        handle_service_result(
            api.orchestrator.configure_hotspot(&body).await,
            "configure_hotspot",
        )
    }

    pub async fn get_ntp_status(api: web::Data<Self>) -> impl Responder {
        debug!("get_ntp_status() called");
        handle_service_result(api.orchestrator.get_ntp_status().await, "get_ntp_status")
    }

    pub async fn configure_ntp(body: web::Json<NtpConfig>, api: web::Data<Self>) -> impl Responder {
        debug!("configure_ntp() called: {body:?}");
        handle_service_result(api.orchestrator.configure_ntp(&body).await, "configure_ntp")
    }

    pub async fn check_ntp_connectivity(
        query: web::Query<ConnectivityQuery>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("check_ntp_connectivity() called: {}", query.host);
        handle_service_result(
            api.orchestrator.check_ntp_connectivity(&query.host).await,
            "check_ntp_connectivity",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command_executor::{CommandOutput, ExecError},
        config::{NetworkConfig, TimeSyncConfig},
    };
    use actix_web::{App, http::StatusCode, test};
    use mockall_double::double;

    #[double]
    use crate::command_executor::CommandExecutor;

    fn api(executor: CommandExecutor) -> Api<CommandExecutor> {
        Api::new(Orchestrator::new(
            executor,
            &NetworkConfig::immediate(1),
            &TimeSyncConfig {
                conf_path: "/nonexistent/timesyncd.conf".into(),
                backup_dir: None,
                clock_file: "/nonexistent/clock".into(),
                ping_timeout_secs: 1,
            },
        ))
    }

    async fn call(api: Api<CommandExecutor>, req: test::TestRequest) -> actix_web::dev::ServiceResponse {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(api))
                .configure(Api::<CommandExecutor>::routes),
        )
        .await;
        test::call_service(&app, req.to_request()).await
    }

    #[tokio::test]
    async fn invalid_hotspot_request_is_a_bad_request() {
        let mut executor = CommandExecutor::default();
        executor.expect_execute().never();

        let req = test::TestRequest::post()
            .uri("/hotspot")
            .set_json(serde_json::json!({"enabled": true, "ssid": "omnect", "password": ""}));

        let resp = call(api(executor), req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_interface_is_not_found() {
        let mut executor = CommandExecutor::default();
        executor.expect_execute().returning(|_| {
            Box::pin(async { Ok(CommandOutput::stdout("eth0:ethernet:connected:eth0\n")) })
        });

        let req = test::TestRequest::get().uri("/network/interfaces/eth7");
        let resp = call(api(executor), req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_interface_is_a_conflict() {
        let mut executor = CommandExecutor::default();
        executor.expect_execute().returning(|_| {
            Box::pin(async { Ok(CommandOutput::stdout("eth0:ethernet:connected:eth0\n")) })
        });

        let req = test::TestRequest::post()
            .uri("/network")
            .set_json(serde_json::json!({"interface": "eth7", "dhcp": true}));
        let resp = call(api(executor), req).await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn healthcheck_reports_network_manager_state() {
        let mut executor = CommandExecutor::default();
        executor
            .expect_execute()
            .withf(|argv| argv.join(" ") == "nmcli -t -f RUNNING general")
            .returning(|argv| {
                let err = ExecError::new(argv, None, "timed out after 30s");
                Box::pin(async move { Err(err) })
            });

        let req = test::TestRequest::get().uri("/healthcheck");
        let resp = call(api(executor), req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
