//! Microsoft Graph resource shapes used by the tutorial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user, as returned by `/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub display_name: Option<String>,

    /// Set for work/school accounts.
    pub mail: Option<String>,

    /// For personal accounts this holds the email address.
    pub user_principal_name: Option<String>,
}

impl User {
    /// Get the best available email: `mail`, falling back to the principal name.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .filter(|mail| !mail.is_empty())
            .or(self.user_principal_name.as_deref())
    }
}

/// A message from a mail folder listing, restricted to the selected fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    pub is_read: Option<bool>,
    pub received_date_time: Option<DateTime<Utc>>,
}

impl Message {
    /// Display name of the sender, if Graph returned one.
    pub fn sender_name(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|r| r.email_address.as_ref())
            .and_then(|a| a.name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

/// One page of a message collection.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub value: Vec<Message>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl MessagePage {
    /// True if the server has further pages.
    pub fn more_available(&self) -> bool {
        self.next_link.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Text,
    #[allow(dead_code)]
    Html,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: BodyType,
    pub content: String,
}

/// A message being composed for `/me/sendMail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
}

impl OutgoingMessage {
    /// A plain-text message addressed to a single recipient.
    pub fn plain_text(subject: &str, body: &str, recipient: &str) -> Self {
        Self {
            subject: subject.to_string(),
            body: ItemBody {
                content_type: BodyType::Text,
                content: body.to_string(),
            },
            to_recipients: vec![Recipient {
                email_address: Some(EmailAddress {
                    name: None,
                    address: Some(recipient.to_string()),
                }),
            }],
        }
    }
}

/// Request body for `/me/sendMail`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMailRequest {
    pub message: OutgoingMessage,
}
