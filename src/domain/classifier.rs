use std::fmt;

use serde::Serialize;

use super::normalize::normalize_text;
use super::order::Order;

/// Logistics bucket an order leaves the warehouse through.
///
/// Variants are declared in rule-priority order, which is also the order the
/// dispatch board lists them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryCategory {
    RecogeBodega,
    Interrapidisimo,
    Transprensa,
    Envia,
    CamionExterno,
    MensajeriaLocal,
    Otros,
}

impl DeliveryCategory {
    pub const ALL: [DeliveryCategory; 7] = [
        Self::RecogeBodega,
        Self::Interrapidisimo,
        Self::Transprensa,
        Self::Envia,
        Self::CamionExterno,
        Self::MensajeriaLocal,
        Self::Otros,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecogeBodega => "recoge_bodega",
            Self::Interrapidisimo => "interrapidisimo",
            Self::Transprensa => "transprensa",
            Self::Envia => "envia",
            Self::CamionExterno => "camion_externo",
            Self::MensajeriaLocal => "mensajeria_local",
            Self::Otros => "otros",
        }
    }

    /// Only locally delivered orders enter the messenger workflow.
    pub fn is_messenger_served(&self) -> bool {
        matches!(self, Self::MensajeriaLocal)
    }
}

impl fmt::Display for DeliveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assign exactly one category from the raw delivery method and carrier name.
///
/// Raw text frequently matches several buckets ("Mensajería Envía Express"),
/// so rules are tried in a fixed order and the first hit wins.
pub fn classify(
    delivery_method: Option<&str>,
    carrier_name: Option<&str>,
    has_assigned_messenger: bool,
) -> DeliveryCategory {
    let method = normalize_text(delivery_method);
    let carrier = normalize_text(carrier_name);

    if method == "recoge_bodega" || method == "recogida_tienda" {
        DeliveryCategory::RecogeBodega
    } else if carrier.contains("inter") && carrier.contains("rapidisimo") {
        DeliveryCategory::Interrapidisimo
    } else if carrier.contains("transprensa") {
        DeliveryCategory::Transprensa
    } else if carrier.contains("envia") {
        DeliveryCategory::Envia
    } else if carrier.contains("camion") && carrier.contains("externo") {
        DeliveryCategory::CamionExterno
    } else if method == "mensajeria_local"
        || method == "mensajero"
        || carrier.contains("mensajeria")
        || carrier.contains("mensajero")
        || carrier == "mensajeria local"
        || has_assigned_messenger
    {
        DeliveryCategory::MensajeriaLocal
    } else if method.is_empty() && carrier.is_empty() {
        // Orders nobody classified are local deliveries by default.
        DeliveryCategory::MensajeriaLocal
    } else {
        DeliveryCategory::Otros
    }
}

/// Classify a loaded order.
pub fn classify_order(order: &Order) -> DeliveryCategory {
    classify(
        order.delivery_method.as_deref(),
        order.carrier_name.as_deref(),
        order.assigned_messenger_id.is_some(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeliveryCategory::*;

    #[test]
    fn warehouse_pickup_methods() {
        assert_eq!(classify(Some("recoge_bodega"), None, false), RecogeBodega);
        assert_eq!(classify(Some("Recogida_Tienda"), Some("Envia"), false), RecogeBodega);
    }

    #[test]
    fn interrapidisimo_matches_anywhere_in_carrier_name() {
        assert_eq!(
            classify(None, Some("Transportadora InterRapidisimo S.A."), false),
            Interrapidisimo
        );
        assert_eq!(classify(None, Some("Inter Rapidísimo"), false), Interrapidisimo);
        // Both fragments are required.
        assert_eq!(classify(Some("nacional"), Some("Inter"), false), Otros);
    }

    #[test]
    fn named_carriers() {
        assert_eq!(classify(None, Some("TRANSPRENSA"), false), Transprensa);
        assert_eq!(classify(None, Some("Envía"), false), Envia);
        assert_eq!(classify(None, Some("Camión Externo"), false), CamionExterno);
    }

    #[test]
    fn carrier_rules_take_priority_over_local_messenger() {
        assert_eq!(classify(Some("mensajeria_local"), Some("Envia"), false), Envia);
        assert_eq!(classify(None, Some("Mensajería Envía"), true), Envia);
    }

    #[test]
    fn method_is_normalised_before_matching() {
        assert_eq!(classify(Some("Mensajeria_Local"), None, false), MensajeriaLocal);
        assert_eq!(classify(Some("  MENSAJERO "), None, false), MensajeriaLocal);
    }

    #[test]
    fn local_messenger_by_carrier_text() {
        assert_eq!(classify(None, Some("Mensajería Local"), false), MensajeriaLocal);
        assert_eq!(classify(Some("domicilio"), Some("Mensajero propio"), false), MensajeriaLocal);
    }

    #[test]
    fn assigned_messenger_pulls_order_into_local_bucket() {
        assert_eq!(classify(Some("domicilio"), None, true), MensajeriaLocal);
        assert_eq!(classify(Some("domicilio"), None, false), Otros);
    }

    #[test]
    fn unclassified_orders_default_to_local_delivery() {
        assert_eq!(classify(None, None, false), MensajeriaLocal);
        assert_eq!(classify(Some(" "), Some(""), false), MensajeriaLocal);
    }

    #[test]
    fn anything_else_is_otros() {
        assert_eq!(classify(Some("nacional"), Some("Servientrega"), false), Otros);
    }

    #[test]
    fn classification_is_deterministic() {
        let inputs = [
            (Some("recoge_bodega"), None),
            (None, Some("Coordinadora")),
            (Some("mensajero"), Some("Camión externo")),
            (None, None),
        ];
        for (method, carrier) in inputs {
            let first = classify(method, carrier, false);
            for _ in 0..10 {
                assert_eq!(classify(method, carrier, false), first);
            }
            assert!(DeliveryCategory::ALL.contains(&first));
        }
    }

    #[test]
    fn only_local_delivery_is_messenger_served() {
        for category in DeliveryCategory::ALL {
            assert_eq!(category.is_messenger_served(), category == MensajeriaLocal);
        }
    }
}
