use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::blood_type::BloodType;
use super::dates::{deserialize_date, deserialize_optional_date};

/// Identifier of a registered account (donor, recipient, or both).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

/// Identifier wrapper for blood requests (`solicitud`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier wrapper for donation records (`donacion`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DonationId(pub String);

/// Account role chosen at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Donante,
    Receptor,
    Ambos,
}

impl UserRole {
    pub const fn requires_donor_capability(self) -> bool {
        matches!(self, UserRole::Donante | UserRole::Ambos)
    }
}

/// Donor-side medical data consumed by the eligibility policy.
///
/// `apto_medico` and `fecha_vencimiento_apto` are maintained by the certificate
/// verification process; the workflow only ever touches the donation counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalProfile {
    #[serde(rename = "usuario_id")]
    pub donor_id: AccountId,
    #[serde(rename = "tipo_sangre")]
    pub blood_type: BloodType,
    #[serde(rename = "peso", default)]
    pub weight_kg: Option<f64>,
    #[serde(rename = "fumador", default)]
    pub smoker: bool,
    #[serde(rename = "tatuajes_recientes", default)]
    pub recent_tattoo: bool,
    #[serde(rename = "apto_medico", default)]
    pub medically_fit: bool,
    #[serde(rename = "fecha_vencimiento_apto", default, deserialize_with = "deserialize_optional_date")]
    pub fitness_expires_on: Option<NaiveDate>,
    #[serde(rename = "ultima_donacion", default, deserialize_with = "deserialize_optional_date")]
    pub last_donation_on: Option<NaiveDate>,
    #[serde(rename = "total_donaciones", default)]
    pub total_donations: u32,
}

impl MedicalProfile {
    pub fn new(donor_id: AccountId, blood_type: BloodType) -> Self {
        Self {
            donor_id,
            blood_type,
            weight_kg: None,
            smoker: false,
            recent_tattoo: false,
            medically_fit: false,
            fitness_expires_on: None,
            last_donation_on: None,
            total_donations: 0,
        }
    }

    pub fn is_first_time_donor(&self) -> bool {
        self.total_donations == 0
    }

    pub(crate) fn record_completed_donation(&mut self, donated_on: NaiveDate) {
        self.total_donations = self.total_donations.saturating_add(1);
        // Bookings can be completed out of date order; the latest gift drives the cooldown.
        self.last_donation_on = Some(
            self.last_donation_on
                .map_or(donated_on, |previous| previous.max(donated_on)),
        );
    }
}

/// Urgency of a blood request, ordered `baja < media < alta < urgente`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Baja,
    Media,
    Alta,
    Urgente,
}

impl RequestPriority {
    pub const fn label(self) -> &'static str {
        match self {
            RequestPriority::Baja => "baja",
            RequestPriority::Media => "media",
            RequestPriority::Alta => "alta",
            RequestPriority::Urgente => "urgente",
        }
    }

    pub const fn is_urgent(self) -> bool {
        matches!(self, RequestPriority::Urgente)
    }
}

/// Lifecycle of a blood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pendiente,
    EnProceso,
    Completada,
    Cancelada,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pendiente => "pendiente",
            RequestStatus::EnProceso => "en_proceso",
            RequestStatus::Completada => "completada",
            RequestStatus::Cancelada => "cancelada",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completada | RequestStatus::Cancelada)
    }
}

/// A recipient's posted need for blood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub id: RequestId,
    #[serde(rename = "usuario_solicitante_id")]
    pub requester_id: AccountId,
    #[serde(rename = "tipo_sangre_requerido")]
    pub required_type: BloodType,
    #[serde(rename = "unidades_requeridas")]
    pub units_required: u32,
    #[serde(rename = "prioridad")]
    pub priority: RequestPriority,
    #[serde(rename = "estado")]
    pub status: RequestStatus,
    #[serde(rename = "es_publica")]
    pub public: bool,
    #[serde(rename = "fecha_necesidad", deserialize_with = "deserialize_date")]
    pub needed_on: NaiveDate,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(rename = "motivo", default)]
    pub reason: Option<String>,
    #[serde(rename = "fecha_completada", default, deserialize_with = "deserialize_optional_date")]
    pub completed_on: Option<NaiveDate>,
}

/// Caller-supplied fields for a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    #[serde(rename = "tipo_sangre_requerido")]
    pub required_type: BloodType,
    #[serde(rename = "unidades_requeridas")]
    pub units_required: u32,
    #[serde(rename = "prioridad", default = "default_priority")]
    pub priority: RequestPriority,
    #[serde(rename = "fecha_necesidad", deserialize_with = "deserialize_date")]
    pub needed_on: NaiveDate,
    #[serde(rename = "es_publica", default = "default_public")]
    pub public: bool,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(rename = "motivo", default)]
    pub reason: Option<String>,
}

fn default_priority() -> RequestPriority {
    RequestPriority::Media
}

fn default_public() -> bool {
    true
}

/// Lifecycle of a single donation appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Programada,
    Completada,
    Cancelada,
    NoAsistio,
}

impl DonationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DonationStatus::Programada => "programada",
            DonationStatus::Completada => "completada",
            DonationStatus::Cancelada => "cancelada",
            DonationStatus::NoAsistio => "no_asistio",
        }
    }
}

/// Why a scheduled donation did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    Cancelada,
    NoAsistio,
}

impl CancellationReason {
    pub const fn resulting_status(self) -> DonationStatus {
        match self {
            CancellationReason::Cancelada => DonationStatus::Cancelada,
            CancellationReason::NoAsistio => DonationStatus::NoAsistio,
        }
    }
}

/// A donor's appointment, optionally tied to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: DonationId,
    #[serde(rename = "donante_id")]
    pub donor_id: AccountId,
    #[serde(rename = "solicitud_id", default)]
    pub request_id: Option<RequestId>,
    #[serde(rename = "fecha_donacion", deserialize_with = "deserialize_date")]
    pub scheduled_on: NaiveDate,
    #[serde(rename = "unidades_donadas")]
    pub units: u32,
    #[serde(rename = "tipo_sangre")]
    pub blood_type: BloodType,
    #[serde(rename = "estado")]
    pub status: DonationStatus,
    #[serde(rename = "es_primera_vez")]
    pub first_time: bool,
    #[serde(rename = "ubicacion_donacion", default)]
    pub location: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
}

/// Caller-supplied fields for a donation scheduled outside any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDraft {
    #[serde(rename = "fecha_donacion", deserialize_with = "deserialize_date")]
    pub scheduled_on: NaiveDate,
    #[serde(rename = "unidades_donadas", default = "default_units")]
    pub units: u32,
    #[serde(rename = "ubicacion_donacion", default)]
    pub location: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
}

fn default_units() -> u32 {
    1
}
