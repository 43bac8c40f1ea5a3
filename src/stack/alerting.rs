//! The alarm topic and its email subscriptions.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::is_valid_email;
use crate::error::{AssemblyError, ConfigError};
use crate::template::{ConstructPath, Expr, Resource};

use super::Stack;

/// SNS topic resource type.
pub const TOPIC_TYPE: &str = "AWS::SNS::Topic";

/// SNS subscription resource type.
pub const SUBSCRIPTION_TYPE: &str = "AWS::SNS::Subscription";

/// Construct name of the alarm topic.
pub const TOPIC_NAME: &str = "Errors";

/// The validated notification destination list.
///
/// Order is kept and duplicates are allowed; each entry becomes one
/// subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationDestinations {
    emails: Vec<String>,
}

impl NotificationDestinations {
    /// Validates every entry as an email address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEmail`] for the first malformed entry.
    pub fn parse<I, S>(emails: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|email| {
                let email = email.as_ref().trim();
                if is_valid_email(email) {
                    Ok(email.to_string())
                } else {
                    Err(ConfigError::InvalidEmail {
                        email: email.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { emails })
    }

    /// Returns true when nobody will receive alerts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Number of destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Iterates over the destinations in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriptionProperties<'a> {
    protocol: &'static str,
    topic_arn: Expr,
    endpoint: &'a str,
}

/// Handle to the alarm topic.
#[derive(Debug, Clone)]
pub struct TopicHandle {
    /// Logical id of the topic.
    pub logical_id: String,
}

impl TopicHandle {
    /// Topic ARN. `Ref` on a topic yields its ARN.
    #[must_use]
    pub fn arn(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }
}

/// Adds the topic and one email subscription per destination.
pub(super) fn add_topic(
    stack: &mut Stack,
    destinations: &NotificationDestinations,
) -> Result<TopicHandle, AssemblyError> {
    let path = ConstructPath::new(&[TOPIC_NAME]);
    let logical_id = stack.add(&path.child("Resource"), Resource::new(TOPIC_TYPE))?;
    let topic = TopicHandle { logical_id };

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for email in destinations.iter() {
        let occurrence = seen.entry(email).or_insert(0);
        *occurrence += 1;
        let component = if *occurrence == 1 {
            email.to_string()
        } else {
            format!("{email}#{occurrence}")
        };

        let props = SubscriptionProperties {
            protocol: "email",
            topic_arn: topic.arn(),
            endpoint: email,
        };
        let id = stack.add(
            &path.child(&component).child("Resource"),
            Resource::from_properties(SUBSCRIPTION_TYPE, &props)?,
        )?;
        debug!(logical_id = %id, "Subscribed {email}");
    }

    Ok(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscriptions(emails: &[&str]) -> Vec<serde_json::Value> {
        let destinations = NotificationDestinations::parse(emails).unwrap();
        let mut stack = Stack::new("applicationmetrics");
        add_topic(&mut stack, &destinations).unwrap();
        stack
            .into_template()
            .resources_of_type(SUBSCRIPTION_TYPE)
            .into_iter()
            .map(|(_, r)| serde_json::Value::Object(r.properties.clone()))
            .collect()
    }

    #[test]
    fn test_parse_rejects_malformed_entry() {
        let err = NotificationDestinations::parse(["ops@example.com", "nope"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEmail { ref email } if email == "nope"));
    }

    #[test]
    fn test_parse_keeps_order_and_duplicates() {
        let destinations =
            NotificationDestinations::parse(["b@example.com", "a@example.com", "b@example.com"])
                .unwrap();
        assert_eq!(
            destinations.iter().collect::<Vec<_>>(),
            ["b@example.com", "a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_single_subscription() {
        let subs = subscriptions(&["ops@example.com"]);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0]["Endpoint"], json!("ops@example.com"));
        assert_eq!(subs[0]["Protocol"], json!("email"));
    }

    #[test]
    fn test_duplicates_get_their_own_subscription() {
        let subs = subscriptions(&["ops@example.com", "ops@example.com"]);
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn test_empty_list_still_creates_topic() {
        let mut stack = Stack::new("applicationmetrics");
        add_topic(&mut stack, &NotificationDestinations::default()).unwrap();
        let template = stack.into_template();
        assert_eq!(template.count_of_type(TOPIC_TYPE), 1);
        assert_eq!(template.count_of_type(SUBSCRIPTION_TYPE), 0);
    }
}
