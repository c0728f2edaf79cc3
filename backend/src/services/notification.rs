//! Notification service and realtime hub
//!
//! Supports:
//! - Directed and broadcast in-app notifications
//! - Per-user read state, including for broadcasts
//! - Pushing notifications and refresh hints to connected WebSocket clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{is_visible_to, NotificationDraft, NotificationType};

/// Notification service for managing notifications
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    hub: NotificationHub,
}

/// A stored notification, with read state resolved for the requesting user
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notificacion {
    pub id: Uuid,
    pub fk_usuario_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub tipo: NotificationType,
    pub titulo: String,
    pub mensaje: String,
    pub entidad: Option<String>,
    pub entidad_id: Option<Uuid>,
    pub leida: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub solo_no_leidas: Option<bool>,
    pub limit: Option<i64>,
}

/// Notification sent manually by an administrator
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationInput {
    /// Absent means every user
    pub fk_usuario_id: Option<Uuid>,
    pub tipo: Option<NotificationType>,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub titulo: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub mensaje: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub no_leidas: i64,
}

// ============================================================================
// Realtime hub
// ============================================================================

/// Event pushed to WebSocket clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum HubEvent {
    Notification(Notificacion),
    /// A resource changed; clients re-fetch their views of it
    Refresh { resource: String },
}

impl HubEvent {
    /// Whether a given user should receive this event
    pub fn is_for(&self, user_id: Uuid) -> bool {
        match self {
            HubEvent::Notification(n) => is_visible_to(n.fk_usuario_id, user_id),
            HubEvent::Refresh { .. } => true,
        }
    }
}

/// Fan-out of events to every connected client
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<HubEvent>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no connected clients is not an error.
    pub fn publish(&self, event: HubEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::debug!(receivers, "Hub event published");
    }

    pub fn refresh(&self, resource: &str) {
        self.publish(HubEvent::Refresh {
            resource: resource.to_string(),
        });
    }
}

// ============================================================================
// Service
// ============================================================================

const NOTIFICACION_COLUMNS: &str = r#"
    n.id, n.fk_usuario_id, n.tipo, n.titulo, n.mensaje, n.entidad, n.entidad_id,
    EXISTS (
        SELECT 1 FROM notificaciones_leidas l
        WHERE l.notificacion_id = n.id AND l.usuario_id = $1
    ) AS leida,
    n.created_at
"#;

impl NotificationService {
    pub fn new(db: PgPool, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// Store a notification on an open connection or transaction. The caller
    /// publishes it once its transaction has committed.
    pub async fn persist(
        conn: &mut PgConnection,
        draft: &NotificationDraft,
        recipient: Option<Uuid>,
    ) -> AppResult<Notificacion> {
        let notificacion = sqlx::query_as::<_, Notificacion>(
            r#"
            INSERT INTO notificaciones (fk_usuario_id, tipo, titulo, mensaje, entidad, entidad_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, fk_usuario_id, tipo, titulo, mensaje, entidad, entidad_id,
                      false AS leida, created_at
            "#,
        )
        .bind(recipient)
        .bind(draft.tipo.as_str())
        .bind(&draft.titulo)
        .bind(&draft.mensaje)
        .bind(draft.entidad)
        .bind(draft.entidad_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(
            notification_id = %notificacion.id,
            tipo = draft.tipo.as_str(),
            "Notification stored"
        );

        Ok(notificacion)
    }

    /// Store and immediately push a notification
    pub async fn notify(
        &self,
        draft: &NotificationDraft,
        recipient: Option<Uuid>,
    ) -> AppResult<Notificacion> {
        let mut conn = self.db.acquire().await?;
        let notificacion = Self::persist(&mut *conn, draft, recipient).await?;
        self.hub.publish(HubEvent::Notification(notificacion.clone()));
        Ok(notificacion)
    }

    /// Administrator-authored notification
    pub async fn create(&self, input: CreateNotificationInput) -> AppResult<Notificacion> {
        input.validate()?;

        if let Some(user_id) = input.fk_usuario_id {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM usuarios WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;
            if !exists {
                return Err(AppError::NotFound("Usuario".to_string()));
            }
        }

        let draft = NotificationDraft {
            tipo: input.tipo.unwrap_or(NotificationType::Sistema),
            titulo: input.titulo.trim().to_string(),
            mensaje: input.mensaje.trim().to_string(),
            entidad: None,
            entidad_id: None,
        };

        self.notify(&draft, input.fk_usuario_id).await
    }

    /// Notifications visible to a user, newest first
    pub async fn list(&self, user_id: Uuid, query: &NotificationQuery) -> AppResult<Vec<Notificacion>> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let only_unread = query.solo_no_leidas.unwrap_or(false);

        let notifications = sqlx::query_as::<_, Notificacion>(&format!(
            r#"
            SELECT {}
            FROM notificaciones n
            WHERE (n.fk_usuario_id IS NULL OR n.fk_usuario_id = $1)
              AND (NOT $2 OR NOT EXISTS (
                  SELECT 1 FROM notificaciones_leidas l
                  WHERE l.notificacion_id = n.id AND l.usuario_id = $1
              ))
            ORDER BY n.created_at DESC
            LIMIT $3
            "#,
            NOTIFICACION_COLUMNS
        ))
        .bind(user_id)
        .bind(only_unread)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<UnreadCount> {
        let no_leidas = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notificaciones n
            WHERE (n.fk_usuario_id IS NULL OR n.fk_usuario_id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM notificaciones_leidas l
                  WHERE l.notificacion_id = n.id AND l.usuario_id = $1
              )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(UnreadCount { no_leidas })
    }

    /// Mark one notification as read for the user
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notificacion> {
        let recipient = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT fk_usuario_id FROM notificaciones WHERE id = $1",
        )
        .bind(notification_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notificación".to_string()))?;

        if !is_visible_to(recipient, user_id) {
            return Err(AppError::NotFound("Notificación".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO notificaciones_leidas (notificacion_id, usuario_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        sqlx::query_as::<_, Notificacion>(&format!(
            "SELECT {} FROM notificaciones n WHERE n.id = $2",
            NOTIFICACION_COLUMNS
        ))
        .bind(user_id)
        .bind(notification_id)
        .fetch_one(&self.db)
        .await
        .map_err(Into::into)
    }

    /// Mark everything visible to the user as read; returns how many changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notificaciones_leidas (notificacion_id, usuario_id)
            SELECT n.id, $1
            FROM notificaciones n
            WHERE n.fk_usuario_id IS NULL OR n.fk_usuario_id = $1
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notificacion(recipient: Option<Uuid>) -> Notificacion {
        Notificacion {
            id: Uuid::new_v4(),
            fk_usuario_id: recipient,
            tipo: NotificationType::StockBajo,
            titulo: "Stock bajo: Urea".to_string(),
            mensaje: "El producto Urea quedó con 2 kg (mínimo 5 kg)".to_string(),
            entidad: Some("productos".to_string()),
            entidad_id: None,
            leida: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_wire_format() {
        let refresh = serde_json::to_value(HubEvent::Refresh {
            resource: "cosechas".to_string(),
        })
        .unwrap();
        assert_eq!(refresh["event"], "refresh");
        assert_eq!(refresh["data"]["resource"], "cosechas");

        let event = serde_json::to_value(HubEvent::Notification(notificacion(None))).unwrap();
        assert_eq!(event["event"], "notification");
        assert_eq!(event["data"]["tipo"], "stock_bajo");
        assert_eq!(event["data"]["leida"], false);
    }

    #[test]
    fn test_event_targeting() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(HubEvent::Notification(notificacion(None)).is_for(me));
        assert!(HubEvent::Notification(notificacion(Some(me))).is_for(me));
        assert!(!HubEvent::Notification(notificacion(Some(other))).is_for(me));
        assert!(HubEvent::Refresh { resource: "ventas".into() }.is_for(me));
    }

    #[test]
    fn test_hub_delivers_to_every_subscriber() {
        tokio_test::block_on(async {
            let hub = NotificationHub::new(8);
            let mut a = hub.subscribe();
            let mut b = hub.subscribe();

            hub.refresh("ventas");

            for rx in [&mut a, &mut b] {
                match rx.recv().await.unwrap() {
                    HubEvent::Refresh { resource } => assert_eq!(resource, "ventas"),
                    other => panic!("unexpected event {:?}", other),
                }
            }
        });
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = NotificationHub::new(4);
        hub.refresh("cosechas");
    }

    #[test]
    fn test_lagging_subscriber_skips_and_continues() {
        tokio_test::block_on(async {
            let hub = NotificationHub::new(2);
            let mut rx = hub.subscribe();

            for resource in ["a", "b", "c", "d"] {
                hub.refresh(resource);
            }

            assert!(matches!(
                rx.recv().await,
                Err(broadcast::error::RecvError::Lagged(2))
            ));
            match rx.recv().await.unwrap() {
                HubEvent::Refresh { resource } => assert_eq!(resource, "c"),
                other => panic!("unexpected event {:?}", other),
            }
        });
    }
}
