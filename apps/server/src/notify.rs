//! Booking confirmation text and the WhatsApp deep link the front desk uses to
//! forward it to the patient.

use url::Url;

use crate::models::Appointment;

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Human-readable confirmation of a booked appointment.
pub fn confirmation_message(specialist_name: &str, appointment: &Appointment) -> String {
    format!(
        "Appointment confirmed with {} on {} at {} for {}. Reason: {}, Insurance: {}",
        specialist_name,
        appointment.date,
        appointment.time,
        appointment.patient_name,
        or_dash(&appointment.reason),
        or_dash(&appointment.insurance),
    )
}

/// `https://wa.me/<digits>?text=<message>`, or `None` when `number` has no digits.
pub fn whatsapp_link(number: &str, message: &str) -> Option<String> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let mut url = Url::parse("https://wa.me/").ok()?;
    url.set_path(&digits);
    url.query_pairs_mut().append_pair("text", message);
    Some(url.to_string())
}
