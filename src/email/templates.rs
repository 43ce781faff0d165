use chrono::{DateTime, Utc};

use super::MeetingInvite;

/// "Monday, June 2, 2025"
fn format_date(value: DateTime<Utc>) -> String {
    value.format("%A, %B %-d, %Y").to_string()
}

/// "2:05 PM"
fn format_time(value: DateTime<Utc>) -> String {
    value.format("%-I:%M %p").to_string()
}

/// Meeting length in whole minutes, rounded to the nearest minute.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    ((end - start).num_milliseconds() as f64 / 60_000.0).round() as i64
}

pub fn invitation_subject(title: &str) -> String {
    format!("Meeting invitation: {title}")
}

const INVITATION_STYLE: &str = "\
body { font-family: 'Google Sans', 'Roboto', Arial, sans-serif; line-height: 1.6; color: #202124; margin: 0; padding: 0; background-color: #f8f9fa; }
.container { max-width: 600px; margin: 0 auto; background-color: white; box-shadow: 0 1px 3px rgba(0,0,0,0.12); }
.header { background-color: #1a73e8; color: white; padding: 32px 24px; text-align: center; }
.header h1 { margin: 0 0 8px 0; font-size: 24px; font-weight: 400; }
.header p { margin: 0; font-size: 14px; opacity: 0.9; }
.content { padding: 32px 24px; }
.meeting-title { font-size: 20px; font-weight: 500; color: #202124; margin: 0 0 24px 0; }
.meeting-details { background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin: 24px 0; border: 1px solid #e8eaed; }
.detail-row { display: flex; align-items: center; margin-bottom: 12px; }
.detail-row:last-child { margin-bottom: 0; }
.detail-icon { width: 20px; height: 20px; margin-right: 12px; color: #5f6368; }
.detail-text { font-size: 14px; color: #202124; }
.join-button { display: inline-block; background-color: #1a73e8; color: white !important; padding: 12px 24px; text-decoration: none; border-radius: 4px; font-weight: 500; font-size: 14px; margin: 24px 0; text-align: center; min-width: 120px; }
.join-button:hover { background-color: #1557b0; color: white !important; }
.link-text { margin-top: 16px; color: #5f6368; font-size: 12px; word-break: break-all; }
.link-text a { color: #1a73e8; text-decoration: none; }
.footer { text-align: center; margin-top: 32px; color: #5f6368; font-size: 12px; padding: 24px; border-top: 1px solid #e8eaed; }
.footer p { margin: 4px 0; }
.description { margin: 16px 0; color: #5f6368; font-size: 14px; }";

pub fn invitation_html(invite: &MeetingInvite) -> String {
    let formatted_date = format_date(invite.start_time);
    let start = format_time(invite.start_time);
    let end = format_time(invite.end_time);
    let duration = duration_minutes(invite.start_time, invite.end_time);

    let description_block = if invite.description.is_empty() {
        String::new()
    } else {
        format!(
            "\n      <div class=\"description\">\n        <strong>Description:</strong><br>\n        {}\n      </div>",
            invite.description
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Meeting Invitation</title>
  <style>
{style}
  </style>
</head>
<body>
  <div class="container">
    <div class="header">
      <h1>Meeting invitation</h1>
      <p>{host} invited you to a meeting</p>
    </div>

    <div class="content">
      <h2 class="meeting-title">{title}</h2>

      <div class="meeting-details">
        <div class="detail-row">
          <div class="detail-icon">📅</div>
          <div class="detail-text">{date}</div>
        </div>
        <div class="detail-row">
          <div class="detail-icon">🕐</div>
          <div class="detail-text">{start} - {end} ({duration} minutes)</div>
        </div>
        <div class="detail-row">
          <div class="detail-icon">👤</div>
          <div class="detail-text">{host}</div>
        </div>
      </div>
{description}
      <div style="text-align: center;">
        <a href="{link}" class="join-button">
          Join meeting
        </a>
      </div>

      <div class="link-text">
        Or copy and paste this link into your browser:<br>
        <a href="{link}">{link}</a>
      </div>
    </div>

    <div class="footer">
      <p>This invitation was sent from WISMeet</p>
      <p>If you have any questions, please contact the meeting host</p>
    </div>
  </div>
</body>
</html>"#,
        style = INVITATION_STYLE,
        host = invite.host_name,
        title = invite.title,
        date = formatted_date,
        start = start,
        end = end,
        duration = duration,
        description = description_block,
        link = invite.meeting_link,
    )
}

pub fn invitation_text(invite: &MeetingInvite) -> String {
    let formatted_date = format_date(invite.start_time);
    let start = format_time(invite.start_time);
    let end = format_time(invite.end_time);
    let duration = duration_minutes(invite.start_time, invite.end_time);

    let description_line = if invite.description.is_empty() {
        String::new()
    } else {
        format!("- Description: {}\n", invite.description)
    };

    format!(
        r#"Meeting invitation: {title}

{host} invited you to a meeting.

Meeting Details:
- Title: {title}
- Date: {date}
- Time: {start} - {end} ({duration} minutes)
- Host: {host}
{description}
Join the meeting by clicking this link: {link}

If you have any questions, please contact the meeting host.

Best regards,
WISMeet
"#,
        title = invite.title,
        host = invite.host_name,
        date = formatted_date,
        start = start,
        end = end,
        duration = duration,
        description = description_line,
        link = invite.meeting_link,
    )
}
