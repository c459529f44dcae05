//! Subjects and bodies for the three outbound messages.

use std::time::Duration;

use super::TicketNotice;

/// Content id the approval HTML uses to reference the inline banner.
pub const BANNER_CONTENT_ID: &str = "event-banner";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn otp(code: &str, ttl: Duration) -> Rendered {
    let minutes = ttl.as_secs().div_ceil(60);
    Rendered {
        subject: "Your Eventazia Verification Code".to_string(),
        text: format!(
            "Your Eventazia verification code is {code}.\n\n\
             It expires in {minutes} minutes. If you did not request this code, you can ignore this email."
        ),
        html: format!(
            "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto\">\
             <h2>Verify your email</h2>\
             <p>Use the code below to continue your Eventazia registration.</p>\
             <p style=\"font-size:32px;font-weight:bold;letter-spacing:8px\">{code}</p>\
             <p>This code expires in {minutes} minutes.</p>\
             <p style=\"color:#666\">If you did not request this code, you can ignore this email.</p>\
             </div>"
        ),
    }
}

pub fn approval(notice: &TicketNotice) -> Rendered {
    let price = format_rupees(notice.price);
    let banner = if notice.banner.is_some() {
        format!(
            "<img src=\"cid:{BANNER_CONTENT_ID}\" alt=\"Event banner\" style=\"width:100%;max-width:600px\"/>"
        )
    } else {
        String::new()
    };
    Rendered {
        subject: format!("🎉 Ticket Approved - {} | Eventazia 2025", notice.ticket_id),
        text: format!(
            "Hi {name},\n\n\
             Your payment has been verified and your ticket is confirmed.\n\n\
             Ticket ID: {ticket_id}\n\
             Ticket type: {ticket_type}\n\
             Price: {price}\n\
             Date: {date}\n\
             Time: {time}\n\
             Venue: {venue}\n\n\
             Please present your ticket ID at the entrance.",
            name = notice.name,
            ticket_id = notice.ticket_id,
            ticket_type = notice.ticket_type,
            date = notice.event_date,
            time = notice.event_time,
            venue = notice.event_venue,
        ),
        html: format!(
            "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto\">\
             {banner}\
             <h2>Your ticket is confirmed</h2>\
             <p>Hi {name}, your payment has been verified.</p>\
             <table style=\"border-collapse:collapse\">\
             <tr><td><strong>Ticket ID</strong></td><td>{ticket_id}</td></tr>\
             <tr><td><strong>Ticket type</strong></td><td>{ticket_type}</td></tr>\
             <tr><td><strong>Price</strong></td><td>{price}</td></tr>\
             <tr><td><strong>Email</strong></td><td>{email}</td></tr>\
             <tr><td><strong>Phone</strong></td><td>{phone}</td></tr>\
             <tr><td><strong>Date</strong></td><td>{date}</td></tr>\
             <tr><td><strong>Time</strong></td><td>{time}</td></tr>\
             <tr><td><strong>Venue</strong></td><td>{venue}</td></tr>\
             </table>\
             <p>Please present your ticket ID at the entrance.</p>\
             </div>",
            name = notice.name,
            ticket_id = notice.ticket_id,
            ticket_type = notice.ticket_type,
            email = notice.email,
            phone = notice.contact_no,
            date = notice.event_date,
            time = notice.event_time,
            venue = notice.event_venue,
        ),
    }
}

pub fn rejection(name: &str, reason: &str) -> Rendered {
    Rendered {
        subject: "Eventazia Registration - Payment Verification Issue".to_string(),
        text: format!(
            "Hi {name},\n\n\
             We could not approve your registration.\n\n\
             Reason: {reason}\n\n\
             You are welcome to register again with a valid payment slip."
        ),
        html: format!(
            "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto\">\
             <h2>Registration not approved</h2>\
             <p>Hi {name}, we could not approve your registration.</p>\
             <p><strong>Reason:</strong> {reason}</p>\
             <p>You are welcome to register again with a valid payment slip.</p>\
             </div>"
        ),
    }
}

/// `3000` becomes `Rs. 3,000.00`.
pub fn format_rupees(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("Rs. {sign}{grouped}.00")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> TicketNotice {
        TicketNotice {
            ticket_id: "EVT-ABC234".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            contact_no: "0771234567".to_string(),
            ticket_type: "General Admission".to_string(),
            price: 3000,
            event_date: "December 15, 2025".to_string(),
            event_time: "6:00 PM - 11:00 PM".to_string(),
            event_venue: "Grand Ballroom".to_string(),
            banner: None,
        }
    }

    #[test]
    fn rupees_are_grouped_by_thousands() {
        assert_eq!(format_rupees(0), "Rs. 0.00");
        assert_eq!(format_rupees(3000), "Rs. 3,000.00");
        assert_eq!(format_rupees(1_234_567), "Rs. 1,234,567.00");
        assert_eq!(format_rupees(999), "Rs. 999.00");
    }

    #[test]
    fn otp_mentions_code_and_lifetime() {
        let rendered = otp("0420", Duration::from_secs(300));
        assert_eq!(rendered.subject, "Your Eventazia Verification Code");
        assert!(rendered.text.contains("0420"));
        assert!(rendered.text.contains("5 minutes"));
        assert!(rendered.html.contains("0420"));
    }

    #[test]
    fn approval_subject_carries_ticket_id() {
        let rendered = approval(&notice());
        assert_eq!(rendered.subject, "🎉 Ticket Approved - EVT-ABC234 | Eventazia 2025");
        assert!(rendered.text.contains("Rs. 3,000.00"));
        assert!(!rendered.html.contains("cid:"));
    }

    #[test]
    fn rejection_includes_reason() {
        let rendered = rejection("Alice", "Slip is unreadable");
        assert_eq!(
            rendered.subject,
            "Eventazia Registration - Payment Verification Issue"
        );
        assert!(rendered.text.contains("Slip is unreadable"));
    }
}
