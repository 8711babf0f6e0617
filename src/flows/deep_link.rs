//! Deep Linking: content-selection sessions and the signed response.

// self
use crate::{
	_prelude::*,
	claims::{
		ContentItem, DeepLinkResponseClaims, DeepLinkingSettings, LTI_VERSION, MessageType,
		VerifiedLaunchClaims,
	},
	error::SigningError,
	flows::{FormFields, LaunchRequest, LtiTool, ProtocolReply, observe},
	http::JwksHttpClient,
	obs::{self, ProtocolStep, StepSpan},
	secret::Secret,
	session::{SessionContext, SessionDraft, SessionKind, token},
};

/// Content-selection session handed to the UI collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionHandle {
	/// Opaque state the UI posts back with the chosen items.
	pub selection_state: String,
	/// Platform constraints for the selection.
	pub settings: DeepLinkingSettings,
	/// When the selection stops being accepted.
	pub expires_at: OffsetDateTime,
}
impl From<SelectionHandle> for ProtocolReply {
	fn from(handle: SelectionHandle) -> Self {
		Self::SelectContent { selection_state: handle.selection_state, settings: handle.settings }
	}
}

/// Items chosen in the content-selection UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLinkReturn {
	/// Selection state from [`SelectionHandle`].
	pub state: String,
	/// Chosen items, in display order.
	pub content_items: Vec<ContentItem>,
}
impl DeepLinkReturn {
	/// Decodes the urlencoded return body: `state` plus `content_items` as a JSON array.
	/// An absent `content_items` field means nothing was selected.
	pub fn from_form(body: &str) -> Result<Self> {
		let form = FormFields::parse(body);
		let state = form.required("state")?;
		let content_items = match form.optional("content_items") {
			Some(json) => {
				let mut de = serde_json::Deserializer::from_str(&json);

				serde_path_to_error::deserialize(&mut de).map_err(|e| Error::InvalidRequest {
					reason: format!("`content_items` is not a content item array: {e}"),
				})?
			},
			None => Vec::new(),
		};

		Ok(Self { state, content_items })
	}
}

/// Signed response ready to be delivered to the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLinkResponse {
	/// `deep_link_return_url` with the `JWT` query parameter appended.
	pub location: Url,
	/// The signed response token, also carried inside `location`.
	pub jwt: Secret,
}

impl<C> LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Verifies a deep linking launch and opens its content-selection session.
	pub async fn deep_link_select(&self, request: LaunchRequest) -> Result<SelectionHandle> {
		let span = StepSpan::new(ProtocolStep::DeepLinkSelect, "deep_link_select");

		observe(
			ProtocolStep::DeepLinkSelect,
			span.instrument(async move {
				let claims = self.verify_launch_at(request, OffsetDateTime::now_utc()).await?;

				self.begin_selection(&claims).await
			}),
		)
		.await
	}

	/// Form-level entry point for the deep-link-select endpoint.
	pub async fn handle_deep_link_select(&self, body: &str) -> ProtocolReply {
		match self.deep_link_select(LaunchRequest::from_form(body)).await {
			Ok(selection) => selection.into(),
			Err(e) => ProtocolReply::deny(&e),
		}
	}

	/// Opens a content-selection session for an already verified deep linking launch.
	pub async fn begin_selection(&self, claims: &VerifiedLaunchClaims) -> Result<SelectionHandle> {
		if !claims.is_deep_linking() {
			return Err(Error::NotDeepLinkingLaunch);
		}

		let settings = claims.deep_linking_settings.clone().ok_or(Error::NotDeepLinkingLaunch)?;
		let draft = SessionDraft {
			issuer: claims.issuer.clone(),
			audience: claims.audience.clone(),
			context: SessionContext::DeepLink {
				deployment_id: claims.deployment_id.clone(),
				settings: settings.clone(),
				subject: claims.subject.clone(),
			},
			ttl: self.config.selection_ttl,
		};
		let handle =
			self.bounded_store(self.sessions.create(draft, OffsetDateTime::now_utc())).await?;

		Ok(SelectionHandle { selection_state: handle.state, settings, expires_at: handle.expires_at })
	}

	/// Consumes the selection session and returns the signed response redirect.
	///
	/// The session is consumed before the selection is checked, so a rejected selection is
	/// final and the user must restart from the platform.
	pub async fn return_deep_link(&self, selection: DeepLinkReturn) -> Result<DeepLinkResponse> {
		let span = StepSpan::new(ProtocolStep::ReturnDeepLink, "return_deep_link");

		observe(ProtocolStep::ReturnDeepLink, span.instrument(self.return_deep_link_inner(selection)))
			.await
	}

	/// Form-level entry point for the return-deep-link endpoint.
	pub async fn handle_return_deep_link(&self, body: &str) -> ProtocolReply {
		let result = match DeepLinkReturn::from_form(body) {
			Ok(selection) => self.return_deep_link(selection).await,
			Err(e) => observe(ProtocolStep::ReturnDeepLink, async move { Err(e) }).await,
		};

		match result {
			Ok(response) => ProtocolReply::Redirect { location: response.location },
			Err(e) => ProtocolReply::deny(&e),
		}
	}

	async fn return_deep_link_inner(&self, selection: DeepLinkReturn) -> Result<DeepLinkResponse> {
		let now = OffsetDateTime::now_utc();
		let session = match self
			.bounded_store(self.sessions.consume(SessionKind::DeepLink, &selection.state, now))
			.await
		{
			Ok(session) => session,
			Err(e) if e.is_missing() => {
				obs::log_session_lookup(ProtocolStep::ReturnDeepLink, SessionKind::DeepLink, &e);

				return Err(Error::SelectionSessionExpired);
			},
			Err(e) => return Err(e.into()),
		};
		let SessionContext::DeepLink { deployment_id, settings, .. } = session.context else {
			return Err(Error::SelectionSessionExpired);
		};

		settings
			.check_selection(&selection.content_items)
			.map_err(|reason| Error::InvalidSelection { reason })?;

		let claims = DeepLinkResponseClaims {
			iss: session.audience,
			aud: session.issuer,
			iat: now.unix_timestamp(),
			exp: (now + self.config.response_ttl).unix_timestamp(),
			nonce: token::random_token(),
			message_type: MessageType::DeepLinkingResponse,
			version: LTI_VERSION.into(),
			deployment_id,
			content_items: selection.content_items,
			data: settings.data,
		};
		let jwt = self.signer.sign(&serde_json::to_value(&claims).map_err(SigningError::from)?)?;

		obs::log_response_signed(&claims.aud, &claims.deployment_id, &jwt.fingerprint());

		let mut location = settings.deep_link_return_url;

		location.query_pairs_mut().append_pair("JWT", jwt.expose());

		Ok(DeepLinkResponse { location, jwt })
	}
}
