// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    Unknown { kind: &'static str, value: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown { kind, value } => write!(f, "unknown {kind} `{value}`"),
        }
    }
}

impl std::error::Error for ParseError {}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn parse(raw: &str) -> Result<Self, ParseError> {
                match raw {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseError::Unknown { kind: $kind, value: raw.to_string() }),
                }
            }

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
pub(crate) use string_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

string_enum!(QuotationStatus, "quotation status", {
    Draft => "draft",
    Sent => "sent",
    Accepted => "accepted",
    Rejected => "rejected",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl QuotationStatus {
    /// Allowed moves: a draft is sent or cancelled; a sent quotation is
    /// accepted, rejected, expired, or pulled back to draft. Everything else
    /// is terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent)
                | (Self::Draft, Self::Cancelled)
                | (Self::Sent, Self::Accepted)
                | (Self::Sent, Self::Rejected)
                | (Self::Sent, Self::Expired)
                | (Self::Sent, Self::Draft)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Rejected | Self::Expired | Self::Cancelled
        )
    }

    /// Only drafts may have their days and expenses edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

string_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    New,
    Contacted,
    Quoted,
    Won,
    Lost,
}

string_enum!(RequestStatus, "request status", {
    New => "new",
    Contacted => "contacted",
    Quoted => "quoted",
    Won => "won",
    Lost => "lost",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
    Cancelled,
}

string_enum!(InvoiceStatus, "invoice status", {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
    Cancelled => "cancelled",
});

impl InvoiceStatus {
    /// Status implied by the paid amount. Cancellation is never derived.
    #[must_use]
    pub const fn from_amounts(amount_cents: i64, paid_cents: i64) -> Self {
        if paid_cents <= 0 {
            Self::Unpaid
        } else if paid_cents >= amount_cents {
            Self::Paid
        } else {
            Self::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotation_transitions_follow_lifecycle() {
        use QuotationStatus::*;
        assert!(Draft.can_transition_to(Sent));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Sent.can_transition_to(Accepted));
        assert!(Sent.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Accepted));
        assert!(!Sent.can_transition_to(Cancelled));
        for terminal in [Accepted, Rejected, Expired, Cancelled] {
            assert!(terminal.is_terminal());
            for next in QuotationStatus::ALL {
                assert!(!terminal.can_transition_to(*next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn statuses_parse_their_own_names() {
        for name in InvoiceStatus::NAMES {
            assert_eq!(InvoiceStatus::parse(name).expect("parse").as_str(), *name);
        }
        let err = BookingStatus::parse("done").expect_err("unknown");
        assert_eq!(err.to_string(), "unknown booking status `done`");
    }

    #[test]
    fn invoice_status_tracks_payments() {
        assert_eq!(InvoiceStatus::from_amounts(1000, 0), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::from_amounts(1000, 1), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::from_amounts(1000, 1000), InvoiceStatus::Paid);
    }
}
