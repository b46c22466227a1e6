use serde::{ Serialize, Deserialize };

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub user_message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    pub bot_response: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TrainResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub limit: Option<usize>,
}
