use std::{sync::Arc, time::Duration};

use validator::Validate;

use crate::{
    error::AppError,
    metrics::TUTOR_REQUESTS_TOTAL,
    models::{
        tutor::{ChatRequest, ChatResponse, Conversation, TutorContext},
        user::User,
    },
    services::{
        access_policy::{authorize, Action},
        context_service::ContextBuilder,
        text_generation::{TextGenerator, UpstreamError},
        AppState,
    },
    store::LearningStore,
};

pub struct TutorService {
    store: Arc<dyn LearningStore>,
    text_generator: Arc<dyn TextGenerator>,
    context_builder: ContextBuilder,
    timeout: Duration,
}

impl TutorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            text_generator: state.text_generator.clone(),
            context_builder: ContextBuilder::new(state),
            timeout: Duration::from_secs(state.config.text_generation.timeout_secs),
        }
    }

    /// Answers a learner question. The conversation is stored only after the
    /// generator returns text.
    pub async fn ask(&self, user: &User, request: ChatRequest) -> Result<ChatResponse, AppError> {
        authorize(user, Action::AskTutor)?;
        if let Err(e) = request.validate() {
            TUTOR_REQUESTS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(e.into());
        }

        let context = self.context_builder.build(&user.id).await?;
        let full_prompt = compose_prompt(user, &context, &request.prompt)?;

        let generated =
            tokio::time::timeout(self.timeout, self.text_generator.generate(&full_prompt))
                .await
                .unwrap_or(Err(UpstreamError::Timeout(self.timeout.as_secs())));

        let response = match generated {
            Ok(text) => text,
            Err(e) => {
                TUTOR_REQUESTS_TOTAL.with_label_values(&["upstream_error"]).inc();
                tracing::warn!("Tutor request for {} failed upstream: {}", user.id, e);
                return Err(e.into());
            }
        };

        self.store
            .insert_conversation(&Conversation::new(&user.id, &request.prompt, &response))
            .await?;

        TUTOR_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
        tracing::info!("Tutor answered learner {}", user.id);

        Ok(ChatResponse { response })
    }
}

/// Mentor instructions with the learner's role and context, followed by the question.
pub fn compose_prompt(
    user: &User,
    context: &TutorContext,
    question: &str,
) -> Result<String, AppError> {
    let context_json = serde_json::to_string_pretty(context)
        .map_err(|e| AppError::Internal(format!("Failed to serialize tutor context: {}", e)))?;

    Ok(format!(
        "You are 'LearnSphere AI', an Academic Mentor.\n\
         User Role: {role}\n\
         \n\
         Student learning context:\n\
         {context_json}\n\
         \n\
         Rules:\n\
         - Guide based on weak topics.\n\
         - Mention progress percentage.\n\
         - Suggest next lessons.\n\
         - Give realistic learning schedule.\n\
         Please instruct, motivate, and guide strictly corresponding to academic goals.\n\
         \n\
         User Question: {question}",
        role = user.role.as_str(),
    ))
}
