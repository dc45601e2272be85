//! Prompt templates for planning and natural-language date extraction.
//!
//! Both templates embed "now" in the reference timezone so relative phrases
//! ("tomorrow", "next Monday") resolve against the same calendar the
//! availability check uses.

/// Build the planning prompt for a free-text scheduling request.
///
/// The model must answer with one JSON object per step, separated by blank
/// lines; the plan parser splits on blank lines.
pub fn build_plan_prompt(request: &str, now_local: &str, timezone: &str) -> String {
    format!(
        "You are an appointment scheduling assistant with USER, PLAN, ACTION and OBSERVATION steps.\n\
         Read the user request, plan which tools to use, then list the actions to take in order.\n\
         \n\
         Available tools:\n\
         - findAttendee(name: string): finds the person the meeting is with.\n\
         - getDate: resolves when the meeting happens. Input is either\n\
           {{\"day\": \"today\" | \"tomorrow\", \"time\": \"10am\" | \"2:30pm\"}} for simple requests, or\n\
           {{\"nlp\": \"next friday at noon\"}} for anything else.\n\
         - checkAvailability(): checks the attendee found earlier at the resolved date.\n\
         - scheduleAppointment(agenda: string): books the meeting once the attendee is available.\n\
         \n\
         Rules:\n\
         - Output one JSON object per step and separate steps with a blank line.\n\
         - Do not wrap the output in prose. Do not number the steps.\n\
         - Always call findAttendee, getDate, checkAvailability, scheduleAppointment in that order.\n\
         \n\
         Example:\n\
         {{\"type\": \"user\", \"user\": \"Schedule a meeting with john doe tomorrow at 10 am about the product roadmap\"}}\n\
         \n\
         {{\"type\": \"plan\", \"plan\": \"Find the attendee, resolve the date, check availability, then schedule.\"}}\n\
         \n\
         {{\"type\": \"action\", \"action\": \"findAttendee\", \"input\": {{\"name\": \"john doe\"}}}}\n\
         \n\
         {{\"type\": \"action\", \"action\": \"getDate\", \"input\": {{\"day\": \"tomorrow\", \"time\": \"10am\"}}}}\n\
         \n\
         {{\"type\": \"action\", \"action\": \"checkAvailability\", \"input\": {{}}}}\n\
         \n\
         {{\"type\": \"action\", \"action\": \"scheduleAppointment\", \"input\": {{\"agenda\": \"Product roadmap\"}}}}\n\
         \n\
         Current date/time ({timezone}): {now_local}\n\
         \n\
         User request:\n\
         \"{request}\"\n"
    )
}

/// Build the date-extraction prompt. The answer must be a bare ISO 8601 UTC string.
pub fn build_date_prompt(phrase: &str, now_local: &str, timezone: &str) -> String {
    format!(
        "You are a date extraction assistant.\n\
         Given a natural language input describing a date and time (e.g., \"tomorrow at 8 am\") \
         and the current date/time in the {timezone} timezone, return ONLY the exact date and time \
         as an ISO 8601 string in UTC format.\n\
         \n\
         Do NOT return any code, explanations, or additional text.\n\
         \n\
         Current date/time in {timezone} timezone: {now_local}\n\
         \n\
         Input: \"{phrase}\"\n\
         \n\
         Output (ISO 8601 UTC date/time string only):"
    )
}
