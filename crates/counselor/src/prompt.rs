//! Prompt construction.
//!
//! Pure functions from structured inputs to instruction strings: role
//! framing first, then the output-shape constraints, then the user's own
//! words interpolated verbatim after light sanitization. No network, no
//! storage, no randomness — a caller that wants variety (e.g. a random
//! tip category) picks before calling.

use reframe_core::SessionData;

/// Strip characters that interfere with downstream JSON extraction and
/// collapse runs of blank lines. User text is otherwise kept verbatim.
pub fn sanitize_input(input: &str) -> String {
    let mut cleaned: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();

    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }

    cleaned.trim().to_string()
}

/// Evaluation of a reframed belief (step 3).
pub fn reframe_evaluation_prompt(reframed_belief: &str, situation: &str, age: u8) -> String {
    format!(
        "You are an expert in peer-counseling education for elementary school students.\n\
         A {age}-year-old student has rewritten a negative thought into a kinder one.\n\
         Evaluate the rewritten thought and give feedback.\n\
         \n\
         Evaluation criteria:\n\
         1. Age-appropriate language (30 points)\n\
         2. A genuinely kinder, more balanced way of seeing the situation (40 points)\n\
         3. Believable rather than forced positivity (30 points)\n\
         \n\
         Situation: {situation}\n\
         Student's rewritten thought: {belief}\n\
         \n\
         Respond with only this JSON format:\n\
         {{\n\
           \"scores\": {{\n\
             \"warmth\": (number 0-100),\n\
             \"realism\": (number 0-100),\n\
             \"overall\": (number 0-100)\n\
           }},\n\
           \"strengths\": [\"good point 1\", \"good point 2\"],\n\
           \"suggestions\": [\"improvement 1\", \"improvement 2\"],\n\
           \"betterExamples\": [\"a stronger rewrite 1\", \"example 2\"]\n\
         }}",
        age = age,
        situation = sanitize_input(situation),
        belief = sanitize_input(reframed_belief),
    )
}

/// Feasibility feedback on an action plan (step 4).
pub fn action_feedback_prompt(action_plan: &str, situation: &str, age: u8) -> String {
    format!(
        "You are an expert in peer-counseling education for elementary school students.\n\
         A {age}-year-old student has proposed a plan of action for a difficult situation.\n\
         Judge whether the plan is something a child that age can actually do.\n\
         \n\
         Situation: {situation}\n\
         Student's plan: {plan}\n\
         \n\
         Respond with only this JSON format:\n\
         {{\n\
           \"scores\": {{\n\
             \"warmth\": (number 0-100),\n\
             \"realism\": (number 0-100),\n\
             \"overall\": (number 0-100)\n\
           }},\n\
           \"strengths\": [\"good point 1\", \"good point 2\"],\n\
           \"suggestions\": [\"improvement 1\", \"improvement 2\"],\n\
           \"betterExamples\": [\"a more doable step 1\", \"example 2\"]\n\
         }}",
        age = age,
        situation = sanitize_input(situation),
        plan = sanitize_input(action_plan),
    )
}

/// CBT-style solution suggestions for a problem and its negative thought.
///
/// Answered in numbered sections, not JSON — parsed by the sectioned
/// solutions parser.
pub fn solutions_prompt(problem: &str, negative_thought: &str, age: u8) -> String {
    format!(
        "Suggest solutions grounded in cognitive-behavioral therapy (CBT) that an \
         elementary school student can understand and put into practice.\n\
         \n\
         Target age: {age}\n\
         Problem situation: {problem}\n\
         Negative thought: {thought}\n\
         \n\
         Answer in this format:\n\
         \n\
         1. New thoughts (3 items):\n\
         - ways to turn the negative thought into a positive one\n\
         \n\
         2. Things to try (3 items):\n\
         - concrete actions the student can actually take\n\
         \n\
         3. Encouragement:\n\
         - a warm, hopeful message\n\
         \n\
         Keep the language simple and friendly, at an elementary-school level.",
        age = age,
        problem = sanitize_input(problem),
        thought = sanitize_input(negative_thought),
    )
}

/// An empathy-style suggestion the student could say to a friend.
/// Free text, no JSON.
pub fn suggestion_prompt(situation: &str, emotions: &[String], age: u8) -> String {
    format!(
        "Write a natural, empathetic thing a {age}-year-old elementary school student \
         could say to a friend.\n\
         \n\
         Requirements:\n\
         - everyday language a kid that age really uses\n\
         - warm and sincere\n\
         - not too grown-up sounding\n\
         - acknowledge what happened, name the feeling, and offer support\n\
         \n\
         Situation: {situation}\n\
         The friend's feelings: {emotions}\n\
         \n\
         Write the empathetic response:",
        age = age,
        situation = sanitize_input(situation),
        emotions = emotions.join(", "),
    )
}

/// Summary synthesis over all four captured fields.
///
/// Also used by the standalone ABC evaluation operation — same shape,
/// same scoring rubric.
pub fn summary_prompt(data: &SessionData, age: u8) -> String {
    format!(
        "You are an expert in peer-counseling education for elementary school students.\n\
         A {age}-year-old student has completed a four-step thought-reframing exercise.\n\
         Score each step and the exercise as a whole.\n\
         \n\
         1. The situation they described: {situation}\n\
         2. The negative thought they named: {belief}\n\
         3. The kinder thought they rewrote it into: {reframe}\n\
         4. The plan of action they chose: {action}\n\
         \n\
         Respond with only this JSON format:\n\
         {{\n\
           \"scores\": {{\n\
             \"situation\": (number 0-100),\n\
             \"belief\": (number 0-100),\n\
             \"reframe\": (number 0-100),\n\
             \"action\": (number 0-100),\n\
             \"overall\": (number 0-100)\n\
           }},\n\
           \"strengths\": [\"good point 1\", \"good point 2\"],\n\
           \"suggestions\": [\"improvement 1\", \"improvement 2\"],\n\
           \"encouragement\": \"a warm closing message\"\n\
         }}",
        age = age,
        situation = sanitize_input(&data.situation),
        belief = sanitize_input(&data.negative_belief),
        reframe = sanitize_input(&data.reframed_belief),
        action = sanitize_input(&data.action_plan),
    )
}

/// A virtual friend's next line in practice mode.
pub fn virtual_friend_prompt(
    personality_framing: &str,
    problem: &str,
    history: &[(String, String)],
    counselor_message: &str,
) -> String {
    let mut transcript = String::new();
    for (speaker, line) in history {
        transcript.push_str(speaker);
        transcript.push_str(": ");
        transcript.push_str(line);
        transcript.push('\n');
    }

    format!(
        "{framing}\n\
         \n\
         Current worry: {problem}\n\
         \n\
         Conversation so far:\n\
         {transcript}\
         Counselor: {message}\n\
         \n\
         Write the 10-year-old friend's natural reply to the counselor's last message.\n\
         Stay in character, and respond in a way that lets the conversation move forward.",
        framing = personality_framing,
        problem = sanitize_input(problem),
        transcript = transcript,
        message = sanitize_input(counselor_message),
    )
}
