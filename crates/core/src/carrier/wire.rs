//! Request and response bodies in the carrier's own field names.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::format::{kilograms, parse_amount};
use super::types::{service_name, CarrierPrePosting, PartySummary};

/// Accept a string or a number where the carrier is inconsistent.
pub(crate) fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept `12.5`, `"12.5"` or `"12,50"`.
pub(crate) fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_amount(&s),
        Some(Value::Number(n)) => parse_amount(&n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Pre-posting creation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyAddress {
    #[serde(rename = "cep")]
    pub postal_code: String,
    #[serde(rename = "logradouro")]
    pub street: String,
    #[serde(rename = "numero")]
    pub number: String,
    #[serde(rename = "complemento", skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(rename = "bairro")]
    pub neighborhood: String,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "uf")]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Party {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cpfCnpj")]
    pub tax_id: String,
    #[serde(rename = "dddCelular")]
    pub area_code: String,
    #[serde(rename = "celular")]
    pub phone: String,
    pub email: String,
    #[serde(rename = "endereco")]
    pub address: PartyAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredItem {
    #[serde(rename = "conteudo")]
    pub content: String,
    #[serde(rename = "quantidade")]
    pub quantity: String,
    #[serde(rename = "valor")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalService {
    #[serde(rename = "codigoServicoAdicional")]
    pub code: String,
    #[serde(rename = "tipoServicoAdicional")]
    pub kind: String,
    #[serde(rename = "valorDeclarado")]
    pub declared_value: String,
}

impl AdditionalService {
    /// Declared-value insurance.
    pub fn declared_value(value: String) -> Self {
        Self {
            code: "019".to_string(),
            kind: "AR".to_string(),
            declared_value: value,
        }
    }
}

/// Body of `POST /prepostagem/v1/prepostagens`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrePostingPayload {
    #[serde(rename = "idCorreios")]
    pub correlation_id: String,
    #[serde(rename = "remetente")]
    pub sender: Party,
    #[serde(rename = "destinatario")]
    pub recipient: Party,
    #[serde(rename = "codigoServico")]
    pub service_code: String,
    #[serde(rename = "numeroCartaoPostagem")]
    pub postage_card: String,
    #[serde(rename = "pesoInformado")]
    pub weight_grams: String,
    #[serde(rename = "codigoFormatoObjetoInformado")]
    pub object_format: String,
    #[serde(rename = "alturaInformada")]
    pub height_cm: String,
    #[serde(rename = "larguraInformada")]
    pub width_cm: String,
    #[serde(rename = "comprimentoInformado")]
    pub length_cm: String,
    #[serde(rename = "cienteObjetoNaoProibido")]
    pub acknowledges_restrictions: u8,
    #[serde(rename = "logisticaReversa", skip_serializing_if = "Option::is_none")]
    pub reverse: Option<String>,
    #[serde(rename = "itensDeclaracaoConteudo")]
    pub declared_items: Vec<DeclaredItem>,
    #[serde(rename = "listaServicoAdicional")]
    pub additional_services: Vec<AdditionalService>,
    #[serde(rename = "observacao")]
    pub note: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub codigo_objeto: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub numero_etiqueta: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub prazo_postagem: Option<String>,
}

// ============================================================================
// Pre-posting lookups
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cep: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub logradouro: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub numero: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub complemento: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub bairro: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cidade: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub uf: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartyWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cpf_cnpj: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub telefone: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub celular: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub email: Option<String>,
    #[serde(default)]
    pub endereco: Option<AddressWire>,
}

impl From<PartyWire> for PartySummary {
    fn from(wire: PartyWire) -> Self {
        let address = wire.endereco.unwrap_or_default();
        Self {
            name: wire.nome,
            tax_id: wire.cpf_cnpj,
            phone: wire.celular.or(wire.telefone),
            email: wire.email,
            postal_code: address.cep,
            street: address.logradouro,
            number: address.numero,
            complement: address.complemento,
            neighborhood: address.bairro,
            city: address.cidade,
            state: address.uf,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrePostingWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id_correios: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub codigo_objeto: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub codigo_servico: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub data_criacao: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub data_postagem: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub peso_informado: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub altura_informada: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub largura_informada: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub comprimento_informado: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub preco_servico: Option<Decimal>,
    #[serde(default)]
    pub remetente: Option<PartyWire>,
    #[serde(default)]
    pub destinatario: Option<PartyWire>,
}

impl From<PrePostingWire> for CarrierPrePosting {
    fn from(wire: PrePostingWire) -> Self {
        Self {
            carrier_id: wire.id,
            correlation_id: wire.id_correios,
            tracking_code: wire.codigo_objeto,
            service_name: wire.codigo_servico.as_deref().map(|c| service_name(c).to_string()),
            service_code: wire.codigo_servico,
            status: wire.status,
            created_at: wire.data_criacao,
            posted_at: wire.data_postagem,
            weight_kg: wire.peso_informado.map(kilograms),
            height_cm: wire.altura_informada,
            width_cm: wire.largura_informada,
            length_cm: wire.comprimento_informado,
            service_price: wire.preco_servico,
            sender: wire.remetente.map(PartySummary::from),
            recipient: wire.destinatario.map(PartySummary::from),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrePostingListWire {
    #[serde(default)]
    pub itens: Option<Vec<PrePostingWire>>,
    #[serde(default)]
    pub content: Option<Vec<PrePostingWire>>,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub first: Option<bool>,
    #[serde(default)]
    pub last: Option<bool>,
}

// ============================================================================
// Tracking
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct TrackingWire {
    #[serde(default)]
    pub objetos: Vec<TrackedObjectWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackedObjectWire {
    #[serde(default)]
    pub tipo_postal: Option<PostalTypeWire>,
    #[serde(default)]
    pub eventos: Vec<EventWire>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub mensagem: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostalTypeWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub descricao: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub dt_hr_criado: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub descricao: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub tipo: Option<String>,
    #[serde(default)]
    pub unidade: Option<UnitWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnitWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub nome: Option<String>,
    #[serde(default)]
    pub endereco: Option<AddressWire>,
}

// ============================================================================
// Quotes
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PriceLotWire {
    pub id_lote: String,
    pub parametros_produto: Vec<PriceParamsWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PriceParamsWire {
    pub co_produto: String,
    pub nu_requisicao: String,
    pub cep_origem: String,
    pub cep_destino: String,
    pub ps_objeto: String,
    pub tp_objeto: String,
    pub comprimento: String,
    pub largura: String,
    pub altura: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LeadTimeLotWire {
    pub id_lote: String,
    pub parametros_prazo: Vec<LeadTimeParamsWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LeadTimeParamsWire {
    pub co_produto: String,
    pub nu_requisicao: String,
    pub cep_origem: String,
    pub cep_destino: String,
    pub dt_evento: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PriceWire {
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub pc_final: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub tx_erro: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LeadTimeWire {
    #[serde(default)]
    pub prazo_entrega: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub data_maxima: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub tx_erro: Option<String>,
}

// ============================================================================
// Labels and delivery interactivity
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LabelJobWire {
    pub id_correios: String,
    pub numero_cartao_postagem: String,
    pub tipo_rotulo: String,
    pub formato_rotulo: String,
    pub imprime_remetente: String,
    pub layout_impressao: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_atendimento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids_pre_postagem: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigos_objeto: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LabelReceiptWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id_recibo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LabelDownloadWire {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub dados: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub url_rotulo: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub mensagem: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeliveryRequestWire {
    pub codigo_objeto: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo_suspensao: Option<String>,
    pub numero_cartao_postagem: String,
}
