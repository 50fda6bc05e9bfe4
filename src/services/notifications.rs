use crate::{
    config::ReconciliationConfig,
    db::DbPool,
    entities::{member_post, post},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

const PRODUCT_PLACEHOLDER: &str = "{product}";

/// Writes delivery notices into the post tables read by the push pipeline.
#[derive(Clone)]
pub struct NotificationEmitter {
    db_pool: Arc<DbPool>,
    title: String,
    message_template: String,
}

impl NotificationEmitter {
    pub fn new(db_pool: Arc<DbPool>, title: String, message_template: String) -> Self {
        Self {
            db_pool,
            title,
            message_template,
        }
    }

    pub fn from_config(db_pool: Arc<DbPool>, config: &ReconciliationConfig) -> Self {
        Self::new(
            db_pool,
            config.notification_title.clone(),
            config.notification_message.clone(),
        )
    }

    pub fn render_message(&self, product_name: &str) -> String {
        self.message_template
            .replace(PRODUCT_PLACEHOLDER, product_name)
    }

    /// Appends one post plus its member delivery row. Returns the post id.
    #[instrument(skip(self), fields(member_id = %member_id))]
    pub async fn notify_delivered(
        &self,
        member_id: Uuid,
        product_name: &str,
    ) -> Result<Uuid, ServiceError> {
        let title = self.title.clone();
        let content = self.render_message(product_name);

        let post_id = self
            .db_pool
            .transaction::<_, Uuid, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let post_id = Uuid::new_v4();

                    post::ActiveModel {
                        id: Set(post_id),
                        post_type: Set(post::POST_TYPE_DELIVERY.to_string()),
                        title: Set(title),
                        content: Set(content),
                        all_send: Set(false),
                        push_send: Set(true),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    member_post::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        post_id: Set(post_id),
                        member_id: Set(member_id),
                        read: Set(false),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    Ok(post_id)
                })
            })
            .await?;

        debug!(%post_id, "delivery notice written");
        Ok(post_id)
    }
}
