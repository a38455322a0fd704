//! Identifiers of commonly used ARCA web services.
//!
//! Any service name accepted by the login authority works with
//! [`TicketCache`](crate::TicketCache); these constants only save typing.

/// Electronic invoicing (Factura Electrónica).
pub const WSFE: &str = "wsfe";

/// Electronic credit invoices for SMEs (Factura de Crédito Electrónica).
pub const WSFECRED: &str = "wsfecred";

/// Grain settlement (Liquidación Primaria de Granos).
pub const WSLPG: &str = "wslpg";

/// Electronic waybills (Carta de Porte Electrónica).
pub const WSCPE: &str = "wscpe";

/// Taxpayer registration certificate lookup (Constancia de Inscripción).
pub const WS_SR_CONSTANCIA_INSCRIPCION: &str = "ws_sr_constancia_inscripcion";

/// Taxpayer registry lookup, scope 10 (Padrón A10).
pub const WS_SR_PADRON_A10: &str = "ws_sr_padron_a10";

/// Every service listed in this module.
pub const ALL: [&str; 6] =
    [WS_SR_CONSTANCIA_INSCRIPCION, WS_SR_PADRON_A10, WSFECRED, WSFE, WSLPG, WSCPE];

#[cfg(test)]
mod tests {
    use arca_wsaa_storage::auth::validate_service_name;

    use super::*;

    #[test]
    fn test_all_services_are_valid_slot_names() {
        for service in ALL {
            assert!(validate_service_name(service).is_ok(), "{service} rejected");
        }
    }
}
