//! HTTP client for the Correios REST API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use futures::future::join_all;
use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::CarrierConfig;
use crate::metrics::{CARRIER_REQUESTS, CARRIER_REQUEST_DURATION};

use super::auth::{CarrierAuthenticator, CorreiosTokenSource};
use super::format::{digits_only, grams, parse_carrier_datetime};
use super::wire::{
    CreatedWire, DeliveryRequestWire, LabelDownloadWire, LabelJobWire, LabelReceiptWire,
    LeadTimeLotWire, LeadTimeParamsWire, LeadTimeWire, PrePostingListWire, PrePostingWire,
    PriceLotWire, PriceParamsWire, PriceWire, TrackingWire,
};
use super::{
    service_name, Carrier, CarrierError, CarrierListFilter, CarrierPrePosting,
    CarrierPrePostingPage, CreatedPrePosting, DeliveryAction, LabelDownload,
    LabelIdentification, LabelOptions, LabelReceipt, PrePostingPayload, QuoteRequest,
    ServiceQuote, TokenStatus, TrackingEvent, TrackingResult,
};

const PRICE_ENDPOINT: &str = "/preco/v1/nacional";
const LEAD_TIME_ENDPOINT: &str = "/prazo/v1/nacional";
const TRACKING_ENDPOINT: &str = "/srorastro/v1/objetos";
const PRE_POSTING_ENDPOINT: &str = "/prepostagem/v1/prepostagens";
const PRE_POSTING_LIST_ENDPOINT: &str = "/prepostagem/v2/prepostagens";
const LABEL_JOB_ENDPOINT: &str = "/prepostagem/v1/prepostagens/rotulo/assincrono/pdf";
const LABEL_DOWNLOAD_ENDPOINT: &str = "/prepostagem/v1/prepostagens/rotulo/download/assincrono";
const SUSPEND_ENDPOINT: &str = "/srointeratividade/v1/solicitacoes/suspender";
const REACTIVATE_ENDPOINT: &str = "/srointeratividade/v1/solicitacoes/reativar";

/// A buffered carrier response.
struct RawResponse {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

impl RawResponse {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn is_pdf(&self) -> bool {
        self.content_type.contains("application/pdf")
    }

    /// Non-success statuses become [`CarrierError::Api`].
    fn ensure_success(self) -> Result<Self, CarrierError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(CarrierError::Api {
                status: self.status.as_u16(),
                body: self.text(),
            })
        }
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T, CarrierError> {
        serde_json::from_slice(&self.body).map_err(|e| CarrierError::MalformedResponse {
            status: self.status.as_u16(),
            reason: e.to_string(),
        })
    }
}

/// Correios API client.
pub struct CorreiosClient {
    client: Client,
    config: CarrierConfig,
    auth: Arc<CarrierAuthenticator>,
}

impl CorreiosClient {
    /// Create a client that authenticates with the configured account.
    pub fn new(config: CarrierConfig) -> Result<Self, CarrierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| CarrierError::ConnectionFailed(e.to_string()))?;
        let source = Arc::new(CorreiosTokenSource::new(&config, client.clone()));
        let auth = Arc::new(CarrierAuthenticator::new(source));
        Ok(Self::with_authenticator(config, client, auth))
    }

    /// Create a client around an existing authenticator.
    pub fn with_authenticator(
        config: CarrierConfig,
        client: Client,
        auth: Arc<CarrierAuthenticator>,
    ) -> Self {
        Self {
            client,
            config,
            auth,
        }
    }

    pub fn authenticator(&self) -> &Arc<CarrierAuthenticator> {
        &self.auth
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn map_send_error(e: reqwest::Error) -> CarrierError {
        if e.is_timeout() {
            CarrierError::Timeout
        } else if e.is_connect() {
            CarrierError::ConnectionFailed(e.to_string())
        } else {
            CarrierError::ConnectionFailed(format!("request failed: {}", e))
        }
    }

    /// Send an authenticated request and buffer the response.
    async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        operation: &'static str,
        method: Method,
        path_and_query: &str,
        body: Option<&B>,
    ) -> Result<RawResponse, CarrierError> {
        let start = Instant::now();
        let result = self.send_inner(method, path_and_query, body).await;

        let outcome = match &result {
            Ok(raw) if raw.status.is_success() => "success",
            Ok(_) => "http_error",
            Err(e) => e.kind(),
        };
        CARRIER_REQUESTS
            .with_label_values(&[operation, outcome])
            .inc();
        CARRIER_REQUEST_DURATION
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn send_inner<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&B>,
    ) -> Result<RawResponse, CarrierError> {
        let token = self.auth.token().await?;
        let url = format!("{}{}", self.base_url(), path_and_query);
        debug!(%method, %url, "Carrier request");

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Self::map_send_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Carrier rejected the bearer token, dropping it");
            self.auth.invalidate().await;
            let body = response.text().await.unwrap_or_default();
            return Err(CarrierError::Authentication(format!(
                "token rejected: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response
            .bytes()
            .await
            .map_err(Self::map_send_error)?
            .to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    /// Correlates the price and lead-time calls of one quote.
    fn lot_id(cart_id: Option<i64>) -> String {
        match cart_id {
            Some(id) => format!("CAR{}", id),
            None => uuid::Uuid::new_v4().simple().to_string()[..10].to_string(),
        }
    }

    fn origin_postal_code(&self, request: &QuoteRequest) -> String {
        let origin = request
            .origin_postal_code
            .as_deref()
            .unwrap_or(&self.config.sender.postal_code);
        digits_only(origin)
    }

    async fn quote_price(
        &self,
        lot: &str,
        service_code: &str,
        request: &QuoteRequest,
    ) -> Result<Decimal, String> {
        let body = PriceLotWire {
            id_lote: lot.to_string(),
            parametros_produto: vec![PriceParamsWire {
                co_produto: service_code.to_string(),
                nu_requisicao: format!("{}_{}_P", lot, service_code),
                cep_origem: self.origin_postal_code(request),
                cep_destino: digits_only(&request.destination_postal_code),
                ps_objeto: grams(request.package.weight_kg),
                tp_objeto: "2".to_string(),
                comprimento: request.package.length_cm.to_string(),
                largura: request.package.width_cm.to_string(),
                altura: request.package.height_cm.to_string(),
            }],
        };

        let raw = self
            .send("quote_price", Method::POST, PRICE_ENDPOINT, Some(&body))
            .await
            .map_err(|e| e.to_string())?
            .ensure_success()
            .map_err(|e| e.to_string())?;
        let entries: Vec<PriceWire> = raw.json().map_err(|e| e.to_string())?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| "empty price response".to_string())?;

        match entry.pc_final {
            Some(price) => Ok(price),
            None => Err(entry.tx_erro.unwrap_or_else(|| "price missing".to_string())),
        }
    }

    async fn quote_lead_time(
        &self,
        lot: &str,
        service_code: &str,
        request: &QuoteRequest,
    ) -> Result<(u32, Option<String>), String> {
        let body = LeadTimeLotWire {
            id_lote: lot.to_string(),
            parametros_prazo: vec![LeadTimeParamsWire {
                co_produto: service_code.to_string(),
                nu_requisicao: format!("{}_{}_D", lot, service_code),
                cep_origem: self.origin_postal_code(request),
                cep_destino: digits_only(&request.destination_postal_code),
                dt_evento: Utc::now().format("%d-%m-%Y").to_string(),
            }],
        };

        let raw = self
            .send("quote_lead_time", Method::POST, LEAD_TIME_ENDPOINT, Some(&body))
            .await
            .map_err(|e| e.to_string())?
            .ensure_success()
            .map_err(|e| e.to_string())?;
        let entries: Vec<LeadTimeWire> = raw.json().map_err(|e| e.to_string())?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| "empty lead time response".to_string())?;

        match entry.prazo_entrega {
            Some(days) => Ok((days, entry.data_maxima)),
            None => Err(entry
                .tx_erro
                .unwrap_or_else(|| "lead time missing".to_string())),
        }
    }

    async fn quote_service(&self, lot: &str, service_code: String, request: &QuoteRequest) -> ServiceQuote {
        let (price, lead_time) = futures::join!(
            self.quote_price(lot, &service_code, request),
            self.quote_lead_time(lot, &service_code, request)
        );

        let mut errors = Vec::new();
        if let Err(e) = &price {
            errors.push(format!("Erro preco: {}", e));
        }
        if let Err(e) = &lead_time {
            errors.push(format!("Erro prazo: {}", e));
        }
        if !errors.is_empty() {
            warn!(service_code = %service_code, errors = ?errors, "Quote partially failed");
        }

        let (delivery_days, max_delivery_date) = match lead_time {
            Ok((days, max)) => (Some(days), max),
            Err(_) => (None, None),
        };

        ServiceQuote {
            service_name: service_name(&service_code).to_string(),
            service_code,
            price: price.ok(),
            delivery_days,
            max_delivery_date,
            error: !errors.is_empty(),
            message: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    fn to_tracking_result(tracking_code: &str, wire: TrackingWire) -> TrackingResult {
        let Some(object) = wire.objetos.into_iter().next() else {
            return TrackingResult::failed(tracking_code, "Objeto nao encontrado");
        };

        if object.eventos.is_empty() {
            if let Some(message) = object.mensagem {
                return TrackingResult::failed(tracking_code, message);
            }
        }

        let events = object
            .eventos
            .into_iter()
            .map(|event| {
                let (unit, city, state) = match event.unidade {
                    Some(unit) => {
                        let address = unit.endereco.unwrap_or_default();
                        (unit.nome, address.cidade, address.uf)
                    }
                    None => (None, None, None),
                };
                TrackingEvent {
                    occurred_at: event.dt_hr_criado.as_deref().and_then(parse_carrier_datetime),
                    description: event.descricao.unwrap_or_default(),
                    event_type: event.tipo.unwrap_or_default(),
                    unit,
                    city,
                    state,
                }
            })
            .collect();

        TrackingResult {
            tracking_code: tracking_code.to_string(),
            postal_type: object.tipo_postal.and_then(|t| t.descricao),
            events,
            error: false,
            message: None,
        }
    }

    async fn lookup(
        &self,
        operation: &'static str,
        path: String,
    ) -> Result<Option<CarrierPrePosting>, CarrierError> {
        let raw = self.send::<()>(operation, Method::GET, &path, None).await?;
        if raw.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let wire: PrePostingWire = raw.ensure_success()?.json()?;
        Ok(Some(CarrierPrePosting::from(wire)))
    }

    async fn delivery_request(
        &self,
        operation: &'static str,
        endpoint: &str,
        tracking_code: &str,
        reason: Option<&str>,
    ) -> Result<DeliveryAction, CarrierError> {
        let body = DeliveryRequestWire {
            codigo_objeto: tracking_code.to_string(),
            motivo_suspensao: reason.map(str::to_string),
            numero_cartao_postagem: self.config.postage_card.clone(),
        };
        let raw = self
            .send(operation, Method::POST, endpoint, Some(&body))
            .await?
            .ensure_success()?;
        Ok(DeliveryAction {
            tracking_code: tracking_code.to_string(),
            accepted: true,
            raw: raw.text(),
        })
    }
}

#[async_trait]
impl Carrier for CorreiosClient {
    fn name(&self) -> &str {
        "correios"
    }

    async fn token_status(&self) -> Result<TokenStatus, CarrierError> {
        Ok(self.auth.token().await?.status())
    }

    async fn quote(&self, request: &QuoteRequest) -> Vec<ServiceQuote> {
        let lot = Self::lot_id(request.cart_id);
        let quotes = request
            .services()
            .into_iter()
            .map(|code| self.quote_service(&lot, code, request));
        join_all(quotes).await
    }

    async fn track(&self, tracking_code: &str) -> TrackingResult {
        let code = tracking_code.trim();
        let path = format!(
            "{}/{}?resultado=T",
            TRACKING_ENDPOINT,
            urlencoding::encode(code)
        );

        let raw = match self.send::<()>("track", Method::GET, &path, None).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(tracking_code = %code, error = %e, "Tracking request failed");
                return TrackingResult::failed(code, e.to_string());
            }
        };

        if !raw.status.is_success() {
            warn!(tracking_code = %code, status = %raw.status, "Tracking lookup rejected");
            return TrackingResult::failed(
                code,
                format!("Erro ao rastrear (HTTP {})", raw.status.as_u16()),
            );
        }

        match raw.json::<TrackingWire>() {
            Ok(wire) => Self::to_tracking_result(code, wire),
            Err(e) => TrackingResult::failed(code, e.to_string()),
        }
    }

    async fn create_pre_posting(
        &self,
        payload: &PrePostingPayload,
    ) -> Result<CreatedPrePosting, CarrierError> {
        let raw = self
            .send("create_pre_posting", Method::POST, PRE_POSTING_ENDPOINT, Some(payload))
            .await?
            .ensure_success()?;
        let wire: CreatedWire = raw.json()?;

        let carrier_id = wire.id.ok_or_else(|| CarrierError::MalformedResponse {
            status: raw.status.as_u16(),
            reason: "pre-posting id missing".to_string(),
        })?;

        Ok(CreatedPrePosting {
            carrier_id,
            tracking_code: wire.codigo_objeto,
            label_number: wire.numero_etiqueta,
            posting_deadline: wire.prazo_postagem.as_deref().and_then(parse_carrier_datetime),
            raw: raw.text(),
        })
    }

    async fn get_pre_posting(
        &self,
        carrier_id: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError> {
        let path = format!("{}/{}", PRE_POSTING_ENDPOINT, urlencoding::encode(carrier_id));
        self.lookup("get_pre_posting", path).await
    }

    async fn get_posted(
        &self,
        tracking_code: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError> {
        let path = format!(
            "{}/postada/{}",
            PRE_POSTING_ENDPOINT,
            urlencoding::encode(tracking_code)
        );
        self.lookup("get_posted", path).await
    }

    async fn list_pre_postings(
        &self,
        filter: &CarrierListFilter,
    ) -> Result<CarrierPrePostingPage, CarrierError> {
        let query = filter
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&");
        let path = format!("{}?{}", PRE_POSTING_LIST_ENDPOINT, query);

        let raw = self
            .send::<()>("list_pre_postings", Method::GET, &path, None)
            .await?
            .ensure_success()?;
        let wire: PrePostingListWire = raw.json()?;

        let items: Vec<CarrierPrePosting> = wire
            .itens
            .or(wire.content)
            .unwrap_or_default()
            .into_iter()
            .map(CarrierPrePosting::from)
            .collect();

        Ok(CarrierPrePostingPage {
            total_elements: wire.total_elements.unwrap_or(items.len() as u64),
            total_pages: wire
                .total_pages
                .unwrap_or(if items.is_empty() { 0 } else { 1 }),
            first: wire.first.unwrap_or(true),
            last: wire.last.unwrap_or(true),
            items,
        })
    }

    async fn cancel_pre_posting(&self, carrier_id: &str) -> Result<(), CarrierError> {
        let path = format!("{}/{}", PRE_POSTING_ENDPOINT, urlencoding::encode(carrier_id));
        self.send::<()>("cancel_pre_posting", Method::DELETE, &path, None)
            .await?
            .ensure_success()?;
        Ok(())
    }

    async fn submit_label_job(
        &self,
        identification: &LabelIdentification,
        options: &LabelOptions,
    ) -> Result<LabelReceipt, CarrierError> {
        let mut body = LabelJobWire {
            id_correios: uuid::Uuid::new_v4().to_string(),
            numero_cartao_postagem: self.config.postage_card.clone(),
            tipo_rotulo: options.label_type.clone(),
            formato_rotulo: options.label_format.clone(),
            imprime_remetente: options.print_sender.clone(),
            layout_impressao: options.layout.clone(),
            id_atendimento: None,
            ids_pre_postagem: None,
            codigos_objeto: None,
        };
        match identification {
            LabelIdentification::Reception(id) => body.id_atendimento = Some(id.clone()),
            LabelIdentification::PrePostingIds(ids) => body.ids_pre_postagem = Some(ids.clone()),
            LabelIdentification::TrackingCodes(codes) => {
                body.codigos_objeto = Some(codes.clone())
            }
        }

        let raw = self
            .send("submit_label_job", Method::POST, LABEL_JOB_ENDPOINT, Some(&body))
            .await?
            .ensure_success()?;
        let wire: LabelReceiptWire = raw.json()?;

        let receipt_id = wire
            .id_recibo
            .filter(|r| !r.is_empty())
            .ok_or_else(|| CarrierError::MalformedResponse {
                status: raw.status.as_u16(),
                reason: "idRecibo missing".to_string(),
            })?;

        Ok(LabelReceipt { receipt_id })
    }

    async fn download_label(&self, receipt_id: &str) -> Result<LabelDownload, CarrierError> {
        let path = format!(
            "{}/{}",
            LABEL_DOWNLOAD_ENDPOINT,
            urlencoding::encode(receipt_id)
        );
        let raw = self
            .send::<()>("download_label", Method::GET, &path, None)
            .await?;

        if raw.status == StatusCode::ACCEPTED {
            return Ok(LabelDownload::Pending { message: None });
        }
        let raw = raw.ensure_success()?;

        if raw.is_pdf() {
            if raw.body.is_empty() {
                return Ok(LabelDownload::Pending { message: None });
            }
            return Ok(LabelDownload::Ready {
                bytes: raw.body,
                file_name: None,
            });
        }

        let wire: LabelDownloadWire = raw.json()?;
        if let Some(data) = wire.dados.filter(|d| !d.is_empty()) {
            let bytes = STANDARD
                .decode(data.trim())
                .map_err(|e| CarrierError::MalformedResponse {
                    status: raw.status.as_u16(),
                    reason: format!("invalid base64 label data: {}", e),
                })?;
            return Ok(LabelDownload::Ready {
                bytes,
                file_name: wire.nome,
            });
        }

        let message = wire
            .url_rotulo
            .map(|url| format!("label published at {}", url))
            .or(wire.mensagem);
        Ok(LabelDownload::Pending { message })
    }

    async fn suspend_delivery(
        &self,
        tracking_code: &str,
        reason: Option<&str>,
    ) -> Result<DeliveryAction, CarrierError> {
        self.delivery_request("suspend_delivery", SUSPEND_ENDPOINT, tracking_code, reason)
            .await
    }

    async fn reactivate_delivery(&self, tracking_code: &str) -> Result<DeliveryAction, CarrierError> {
        self.delivery_request("reactivate_delivery", REACTIVATE_ENDPOINT, tracking_code, None)
            .await
    }
}
