//! Locale-keyed message tables with variant phrasing.
//!
//! Each locale maps a message key to one or more format functions. When a
//! key has several variants one is picked pseudo-randomly per call so the
//! skill does not repeat itself verbatim; the chooser is injectable so
//! tests can pin the outcome. Unknown keys render a diagnostic string and
//! never fail a turn.

pub mod numerals;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use std::collections::HashMap;

pub use numerals::{apocopate, cardinal_es, ordinal_es, Gender};

type MessageFn = fn(&[String]) -> String;
type Chooser = Box<dyn Fn(usize) -> usize + Send + Sync>;

pub struct MessageStore {
    locales: HashMap<String, HashMap<&'static str, Vec<MessageFn>>>,
    chooser: Chooser,
}

impl MessageStore {
    /// Standard store with uniform random variant selection.
    pub fn new() -> Self {
        Self::with_chooser(Box::new(|len| rand::Rng::random_range(&mut rand::rng(), 0..len)))
    }

    /// Store with a pinned variant chooser, for tests.
    pub fn with_chooser(chooser: Chooser) -> Self {
        let mut locales = HashMap::new();
        locales.insert("es-ES".to_string(), spanish_table());
        Self { locales, chooser }
    }

    /// Render a message. The trailing space separates it from whatever gets
    /// appended next (advisories, follow-up prompts).
    pub fn render(&self, locale: &str, key: &str, args: &[String]) -> String {
        let Some(variants) = self.locales.get(locale).and_then(|table| table.get(key)) else {
            tracing::warn!(locale, key, "no phrase for message key");
            return format!("No se encontró la frase ({key})");
        };
        let index = if variants.len() > 1 {
            (self.chooser)(variants.len())
        } else {
            0
        };
        let mut text = variants[index](args);
        text.push(' ');
        text
    }
}

fn arg(args: &[String], index: usize) -> &str {
    args.get(index).map_or("", String::as_str)
}

#[rustfmt::skip]
fn spanish_table() -> HashMap<&'static str, Vec<MessageFn>> {
    let mut table: HashMap<&'static str, Vec<MessageFn>> = HashMap::new();

    table.insert("welcome", vec![
        |_| "Te damos la bienvenida.".into(),
        |_| "Hola, te damos la bienvenida.".into(),
    ]);
    table.insert("fallback", vec![
        |_| "No estoy segura. Te puedo ayudar a solicitar un voluntario. ¿Qué quieres hacer?".into(),
        |_| "No te he entendido. Puedo ayudarte a solicitar un voluntario. ¿Qué quieres hacer?".into(),
    ]);
    table.insert("error", vec![
        |_| "Lo siento, he tenido un problema. Prueba nuevamente.".into(),
    ]);
    table.insert("confirm-once", vec![|a| format!(
        "Voy a solicitar un voluntario para {} el {}, desde las {} hasta las {}.",
        arg(a, 0), arg(a, 1), arg(a, 2), arg(a, 3)
    )]);
    table.insert("confirm-rec", vec![|a| format!(
        "Voy a solicitar un voluntario para {} {}, comenzando el {}, hasta el {}.",
        arg(a, 0), arg(a, 1), arg(a, 2), arg(a, 3)
    )]);
    table.insert("rec-item", vec![|a| format!(
        "los {} de las {} hasta las {}",
        arg(a, 0), arg(a, 1), arg(a, 2)
    )]);
    table.insert("blind-families-only", vec![
        |_| "Este servicio es solamente para familias ciegas.".into(),
    ]);
    table.insert("service-overlaps", vec![
        |_| "El servicio se superpone con otro que ya tienes solicitado.".into(),
    ]);
    table.insert("service-unknown", vec![
        |_| "No he reconocido ese servicio. ¿Cuál deseas solicitar?".into(),
    ]);
    table.insert("account-not-linked", vec![
        |_| "Para solicitar un voluntario necesitas vincular tu cuenta desde la aplicación.".into(),
    ]);
    table.insert("timeout-transact", vec![
        |_| "El servicio está tardando demasiado. Prueba nuevamente en unos minutos.".into(),
    ]);
    table.insert("timeout", vec![|a| format!(
        "La {} está tardando demasiado. Prueba nuevamente en unos minutos.",
        arg(a, 0)
    )]);
    table.insert("error-ws", vec![
        |_| "No he podido comunicarme con el servicio.".into(),
    ]);
    table.insert("request-denied", vec![
        |_| "La solicitud no ha podido registrarse.".into(),
    ]);
    table.insert("request-accepted", vec![
        |_| "Tu solicitud ha quedado registrada.".into(),
    ]);
    table.insert("window-start-in-past", vec![
        |_| "La fecha de inicio no puede ser anterior a hoy.".into(),
    ]);
    table.insert("window-end-before-start", vec![
        |_| "La fecha de finalización no puede ser anterior a la de inicio.".into(),
    ]);
    table.insert("window-too-long", vec![
        |_| "La fecha de finalización no puede ser más de 90 días después del inicio.".into(),
    ]);
    table.insert("services-count", vec![|a| format!(
        "Tiene {} servicio{} activo{}.",
        arg(a, 0), arg(a, 1), arg(a, 1)
    )]);
    table.insert("no-active-services", vec![
        |_| "No tiene servicios activos.".into(),
    ]);
    table.insert("service-position", vec![|a| format!(
        "El {} servicio:",
        arg(a, 0)
    )]);
    table.insert("service-once-detail", vec![|a| format!(
        "Servicio para {} {} el día {}; desde las {}, hasta las {}.",
        arg(a, 0), arg(a, 1), arg(a, 2), arg(a, 3), arg(a, 4)
    )]);
    table.insert("service-periodic-detail", vec![|a| format!(
        "Servicio periódico de {} {}, en {} ocasiones desde el día {}, hasta el día {}.{}",
        arg(a, 0), arg(a, 1), arg(a, 2), arg(a, 3), arg(a, 4), arg(a, 5)
    )]);
    table.insert("service-periodic-day", vec![|a| format!(
        " Los {}, de las {} hasta las {}.",
        arg(a, 0), arg(a, 1), arg(a, 2)
    )]);
    table.insert("services-help-prompt", vec![
        |_| "¿Qué servicio deseas solicitar?".into(),
    ]);

    table
}

// ─── Spanish date/time helpers ───────────────────────────────────────────────
// chrono is compiled without locale data; these tables are all we need.

pub fn weekday_name_es(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

pub fn month_name_es(month: u32) -> &'static str {
    match month {
        1 => "enero",
        2 => "febrero",
        3 => "marzo",
        4 => "abril",
        5 => "mayo",
        6 => "junio",
        7 => "julio",
        8 => "agosto",
        9 => "septiembre",
        10 => "octubre",
        11 => "noviembre",
        _ => "diciembre",
    }
}

/// "lunes, 7 de septiembre de 2026"
pub fn format_date_es(date: NaiveDate) -> String {
    format!(
        "{}, {} de {} de {}",
        weekday_name_es(date.weekday()),
        date.day(),
        month_name_es(date.month()),
        date.year()
    )
}

/// Wall-clock time as spoken text.
pub fn format_time_es(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pinned(index: usize) -> MessageStore {
        MessageStore::with_chooser(Box::new(move |len| index.min(len - 1)))
    }

    #[test]
    fn renders_known_key_with_args() {
        let store = pinned(0);
        let text = store.render(
            "es-ES",
            "confirm-once",
            &[
                "acompañamiento".into(),
                "lunes, 7 de septiembre de 2026".into(),
                "09:00".into(),
                "12:00".into(),
            ],
        );
        assert!(text.contains("acompañamiento"));
        assert!(text.contains("09:00"));
        assert!(text.ends_with(' '));
    }

    #[test]
    fn unknown_key_yields_diagnostic_not_panic() {
        let store = pinned(0);
        let text = store.render("es-ES", "nonexistent-key", &[]);
        assert!(text.contains("nonexistent-key"));
    }

    #[test]
    fn unknown_locale_yields_diagnostic() {
        let store = pinned(0);
        let text = store.render("fr-FR", "welcome", &[]);
        assert!(text.contains("welcome"));
    }

    #[test]
    fn variant_selection_follows_the_chooser() {
        let first = pinned(0).render("es-ES", "welcome", &[]);
        let second = pinned(1).render("es-ES", "welcome", &[]);
        assert_ne!(first, second);
    }

    #[test]
    fn chooser_sees_the_variant_count() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_inner = Arc::clone(&seen);
        let store = MessageStore::with_chooser(Box::new(move |len| {
            seen_inner.store(len, Ordering::SeqCst);
            0
        }));
        store.render("es-ES", "welcome", &[]);
        assert!(seen.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn spanish_date_formatting() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        assert_eq!(format_date_es(date), "lunes, 7 de septiembre de 2026");
    }
}
