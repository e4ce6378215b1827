//! Route templates and rate-limit bucket keys
//!
//! A [`Route`] is a path template such as `/channels/{channel_id}/messages`
//! plus the values to fill it with. Identifiers that scope a rate limit
//! (application, guild, channel, webhook) are recorded as [`MajorParams`] when
//! they are set, so the bucket key never has to be parsed back out of a path.

use crate::error::{HttpError, HttpResult};
use crate::request::ApiRequest;
use chatlink_core::Snowflake;
use reqwest::Method;
use std::fmt;

/// Identifiers that partition rate limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MajorParams {
    pub application_id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub webhook_id: Option<Snowflake>,
    pub webhook_token: Option<String>,
}

/// Key of a rate-limit bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    /// The account-wide limit shared by every route
    Global,
    /// A method scoped by its major parameters
    Route { method: Method, major: MajorParams },
}

impl BucketKey {
    #[must_use]
    pub fn route(method: Method, major: MajorParams) -> Self {
        Self::Route { method, major }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Route { method, major } => {
                write!(f, "{method}")?;
                let ids = [
                    ("application", major.application_id),
                    ("guild", major.guild_id),
                    ("channel", major.channel_id),
                    ("webhook", major.webhook_id),
                ];
                for (name, id) in ids {
                    if let Some(id) = id {
                        write!(f, " {name}={id}")?;
                    }
                }
                if major.webhook_token.is_some() {
                    write!(f, " token=*")?;
                }
                Ok(())
            }
        }
    }
}

/// A REST route template and its arguments
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    template: &'static str,
    params: Vec<(&'static str, String)>,
    major: MajorParams,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, template: &'static str) -> Self {
        Self {
            method,
            template,
            params: Vec::new(),
            major: MajorParams::default(),
        }
    }

    #[must_use]
    pub fn get(template: &'static str) -> Self {
        Self::new(Method::GET, template)
    }

    #[must_use]
    pub fn post(template: &'static str) -> Self {
        Self::new(Method::POST, template)
    }

    #[must_use]
    pub fn put(template: &'static str) -> Self {
        Self::new(Method::PUT, template)
    }

    #[must_use]
    pub fn patch(template: &'static str) -> Self {
        Self::new(Method::PATCH, template)
    }

    #[must_use]
    pub fn delete(template: &'static str) -> Self {
        Self::new(Method::DELETE, template)
    }

    pub fn application_id(mut self, id: Snowflake) -> Self {
        self.major.application_id = Some(id);
        self.param("application_id", id)
    }

    pub fn guild_id(mut self, id: Snowflake) -> Self {
        self.major.guild_id = Some(id);
        self.param("guild_id", id)
    }

    pub fn channel_id(mut self, id: Snowflake) -> Self {
        self.major.channel_id = Some(id);
        self.param("channel_id", id)
    }

    pub fn webhook_id(mut self, id: Snowflake) -> Self {
        self.major.webhook_id = Some(id);
        self.param("webhook_id", id)
    }

    pub fn webhook_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.major.webhook_token = Some(token.clone());
        self.param("webhook_token", token)
    }

    /// Fill a template parameter that does not scope the rate limit
    pub fn param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn major(&self) -> &MajorParams {
        &self.major
    }

    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::route(self.method.clone(), self.major.clone())
    }

    /// Substitute every `{name}` in the template, percent-encoding values
    pub fn path(&self) -> HttpResult<String> {
        let template = self.template;
        let mut path = String::with_capacity(template.len() + 32);
        let mut rest = template;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open..].find('}') else {
                break;
            };
            let name = &template[offset + open + 1..offset + open + len];
            let value = self
                .params
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v)
                .ok_or(HttpError::MissingParam(name))?;

            path.push_str(&rest[..open]);
            path.push_str(&urlencoding::encode(value));

            offset += open + len + 1;
            rest = &template[offset..];
        }
        path.push_str(rest);

        Ok(path)
    }

    /// Resolve into a request with no body
    pub fn into_request(self) -> HttpResult<ApiRequest> {
        let path = self.path()?;
        Ok(ApiRequest::new(self.method.clone(), path, self.bucket_key()))
    }
}
