use qsa_config_store::{DesignConfig, ElementConfig, ElementType};
use qsa_interface::{ErrorCode, QsaId, SerialInteger, WorkflowError, WorkflowResult};

use crate::fmt::mm;
use crate::text::{render_text, Anchor};
use crate::{
    micro_id, ComposerSettings, Rotation, CANVAS_HEIGHT_MM, CANVAS_WIDTH_MM, LED_CODE_HEIGHT_MM,
    MODULE_ID_HEIGHT_MM, QR_SIZE_MM, SERIAL_URL_HEIGHT_MM,
};

/// Everything the composer needs about one module on the carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArt {
    /// Slot on the carrier, 1-8.
    pub array_position: u8,
    /// SKU engraved as the module-ID text.
    pub module_sku: String,
    /// The module's reserved serial.
    pub serial: SerialInteger,
    /// LED component codes, in component order.
    pub led_codes: Vec<String>,
}

/// One physical carrier's composition input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierArt {
    /// The row's QSA identifier, encoded in the carrier QR code.
    pub qsa_id: QsaId,
    /// Modules present on this carrier.
    pub modules: Vec<ModuleArt>,
}

/// Composes the full SVG document for one carrier. Pure and
/// byte-deterministic: same input, same config, same settings, same
/// bytes.
pub fn compose(
    carrier: &CarrierArt,
    config: &DesignConfig,
    settings: &ComposerSettings,
) -> WorkflowResult<String> {
    if carrier.modules.is_empty() {
        return Err(WorkflowError::new(
            ErrorCode::NoModules,
            "carrier has no modules to compose",
        ));
    }
    validate_led_codes(carrier, config)?;

    let mut modules = carrier.modules.clone();
    modules.sort_by_key(|m| m.array_position);

    let mut body = String::new();

    // Design-level QR code at position 0.
    let qr_config = config.element(0, ElementType::QrCode).ok_or_else(|| {
        WorkflowError::new(
            ErrorCode::MissingQrCode,
            format!("design {} has no position-0 qr_code element", config.design),
        )
    })?;
    let qr = crate::QrCode::encode(&format!("quadi.ca/{}", carrier.qsa_id))?;
    body.push_str("<g id=\"qr\">");
    body.push_str(&qr.render(
        qr_config.x,
        qr_config.y,
        qr_config.rotation,
        qr_config.element_size.unwrap_or(QR_SIZE_MM),
    ));
    body.push_str("</g>\n");

    for module in &modules {
        body.push_str(&compose_module(module, config, settings)?);
    }

    let mut out = String::with_capacity(body.len() + 512);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<svg width=\"{w}mm\" height=\"{h}mm\" viewBox=\"0 0 {w} {h}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        w = mm(CANVAS_WIDTH_MM),
        h = mm(CANVAS_HEIGHT_MM),
    ));
    out.push_str(&format!("<g{}>\n", global_transform(settings)));
    out.push_str(&body);
    out.push_str("</g>\n</svg>\n");
    Ok(out)
}

fn compose_module(
    module: &ModuleArt,
    config: &DesignConfig,
    settings: &ComposerSettings,
) -> WorkflowResult<String> {
    let position = module.array_position;
    let element = |element_type: ElementType| config.element(position, element_type);
    let required = |element_type: ElementType| -> WorkflowResult<&ElementConfig> {
        element(element_type).ok_or_else(|| {
            WorkflowError::new(
                ErrorCode::ConfigNotFound,
                format!(
                    "design {} has no {} element at position {}",
                    config.design, element_type, position
                ),
            )
        })
    };

    let mut out = format!("<g id=\"pos-{}\">", position);

    let micro = required(ElementType::MicroId)?;
    out.push_str(&micro_id::render(
        module.serial,
        micro.x,
        micro.y,
        micro.rotation,
    ));

    let module_id = required(ElementType::ModuleId)?;
    out.push_str(&render_text(
        &module.module_sku,
        module_id.x,
        module_id.y,
        module_id.rotation,
        module_id.text_height.unwrap_or(MODULE_ID_HEIGHT_MM),
        Anchor::Start,
        1.0,
    )?);

    if let Some(serial_url) = element(ElementType::SerialUrl) {
        out.push_str(&render_text(
            &format!("QUADI.CA/{}", module.serial),
            serial_url.x,
            serial_url.y,
            serial_url.rotation,
            serial_url.text_height.unwrap_or(SERIAL_URL_HEIGHT_MM),
            Anchor::Start,
            1.0,
        )?);
    }

    for index in 1..=9u8 {
        if let Some(led) = element(ElementType::LedCode(index)) {
            let code = &module.led_codes[index as usize - 1];
            out.push_str(&render_text(
                code,
                led.x,
                led.y,
                led.rotation,
                led.text_height.unwrap_or(LED_CODE_HEIGHT_MM),
                Anchor::Middle,
                settings.led_tracking,
            )?);
        }
    }

    out.push_str("</g>\n");
    Ok(out)
}

/// LED codes are exactly three alphanumerics; a missing or invalid code
/// for any configured LED element fails the whole carrier, listing every
/// offender.
fn validate_led_codes(carrier: &CarrierArt, config: &DesignConfig) -> WorkflowResult<()> {
    let mut failures = Vec::new();
    for module in &carrier.modules {
        for index in 1..=9u8 {
            if config
                .element(module.array_position, ElementType::LedCode(index))
                .is_none()
            {
                continue;
            }
            match module.led_codes.get(index as usize - 1) {
                None => failures.push(format!(
                    "position {} ({}): led_code_{} missing",
                    module.array_position, module.module_sku, index
                )),
                Some(code) if !is_valid_led_code(code) => failures.push(format!(
                    "position {} ({}): led_code_{} '{}' invalid",
                    module.array_position, module.module_sku, index, code
                )),
                Some(_) => {}
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::new(
            ErrorCode::LedResolutionFailed,
            failures.join("; "),
        ))
    }
}

fn is_valid_led_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn global_transform(settings: &ComposerSettings) -> String {
    let mut parts = Vec::new();
    if settings.top_offset_mm != 0.0 {
        parts.push(format!("translate(0 {})", mm(settings.top_offset_mm)));
    }
    if settings.rotation != Rotation::R0 {
        parts.push(format!(
            "rotate({} {} {})",
            settings.rotation.degrees(),
            mm(CANVAS_WIDTH_MM / 2.0),
            mm(CANVAS_HEIGHT_MM / 2.0),
        ));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" transform=\"{}\"", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use qsa_config_store::{ConfigStore, ElementUpsert};
    use qsa_db::EngraveDb;
    use qsa_interface::Design;

    use super::*;

    fn test_config() -> DesignConfig {
        let store = ConfigStore::new(EngraveDb::in_memory().unwrap());
        let design = Design::try_new("CUBE").unwrap();
        let set = |position: u8, element_type: ElementType, x: f64, y: f64| {
            store
                .set_element(
                    &design,
                    None,
                    ElementUpsert {
                        position,
                        element_type,
                        origin_x: x,
                        origin_y: y,
                        rotation: 0.0,
                        text_height: None,
                        element_size: None,
                    },
                )
                .unwrap();
        };
        set(0, ElementType::QrCode, 72.0, 55.0);
        for position in 1..=2 {
            let x = position as f64 * 18.0;
            set(position, ElementType::MicroId, x, 100.0);
            set(position, ElementType::ModuleId, x, 95.0);
            set(position, ElementType::SerialUrl, x, 92.0);
            set(position, ElementType::LedCode(1), x, 89.0);
        }
        store.get_config(&design, None).unwrap()
    }

    fn art() -> CarrierArt {
        CarrierArt {
            qsa_id: "CUBE00076".parse().unwrap(),
            modules: vec![
                ModuleArt {
                    array_position: 1,
                    module_sku: "CUBE-00001".into(),
                    serial: SerialInteger::new(1).unwrap(),
                    led_codes: vec!["W2A".into()],
                },
                ModuleArt {
                    array_position: 2,
                    module_sku: "CUBE-00001".into(),
                    serial: SerialInteger::new(2).unwrap(),
                    led_codes: vec!["W2A".into()],
                },
            ],
        }
    }

    fn hash(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn document_has_the_contract_root_and_groups() {
        let svg = compose(&art(), &test_config(), &ComposerSettings::default()).unwrap();
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(svg.contains(
            "<svg width=\"148mm\" height=\"113.7mm\" viewBox=\"0 0 148 113.7\" xmlns=\"http://www.w3.org/2000/svg\">"
        ));
        assert!(svg.contains("<g id=\"qr\">"));
        assert!(svg.contains("<g id=\"pos-1\">"));
        assert!(svg.contains("<g id=\"pos-2\">"));
        assert!(svg.ends_with("</svg>\n"));
        // No stylesheets, fonts or external references.
        assert!(!svg.contains("class="));
        assert!(!svg.contains("font"));
        assert!(!svg.contains("href"));
    }

    #[test]
    fn composition_is_byte_deterministic() {
        let config = test_config();
        let settings = ComposerSettings::default();
        let first = compose(&art(), &config, &settings).unwrap();
        let second = compose(&art(), &config, &settings).unwrap();
        assert_eq!(hash(&first), hash(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn serial_changes_the_bytes() {
        let config = test_config();
        let settings = ComposerSettings::default();
        let mut other = art();
        other.modules[0].serial = SerialInteger::new(3).unwrap();
        assert_ne!(
            compose(&art(), &config, &settings).unwrap(),
            compose(&other, &config, &settings).unwrap()
        );
    }

    #[test]
    fn settings_rotate_and_nudge_the_whole_document() {
        let config = test_config();
        let rotated = compose(
            &art(),
            &config,
            &ComposerSettings::new(Rotation::R180, 1.5, 1.0).unwrap(),
        )
        .unwrap();
        assert!(rotated.contains("<g transform=\"translate(0 1.5) rotate(180 74 56.85)\">"));

        let plain = compose(&art(), &config, &ComposerSettings::default()).unwrap();
        assert!(plain.contains("<g>\n"));
    }

    #[test]
    fn missing_led_code_fails_with_every_offender_listed() {
        let config = test_config();
        let mut bad = art();
        bad.modules[0].led_codes.clear();
        bad.modules[1].led_codes = vec!["TOOLONG".into()];

        let err = compose(&bad, &config, &ComposerSettings::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::LedResolutionFailed);
        assert!(err.message.contains("position 1"));
        assert!(err.message.contains("position 2"));
    }

    #[test]
    fn empty_carrier_is_refused() {
        let empty = CarrierArt {
            qsa_id: "CUBE00076".parse().unwrap(),
            modules: vec![],
        };
        let err = compose(&empty, &test_config(), &ComposerSettings::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoModules);
    }

    #[test]
    fn modules_render_in_slot_order_regardless_of_input_order() {
        let config = test_config();
        let settings = ComposerSettings::default();
        let mut shuffled = art();
        shuffled.modules.reverse();
        assert_eq!(
            compose(&art(), &config, &settings).unwrap(),
            compose(&shuffled, &config, &settings).unwrap()
        );
    }
}
