//! Centralised prompt texts.
//!
//! Every prompt sent to the model lives here so the wording can be audited
//! and tuned in one place. The response formats requested below are the ones
//! `crate::parse` expects back.

// ---------------------------------------------------------------------------
// evaluate — coherence scoring
// ---------------------------------------------------------------------------

pub const EVALUATE_SYSTEM: &str =
    "You are a meticulous literary critic specializing in narrative coherence.";

/// Shown in place of the next episode's text for the last episode.
pub const NO_NEXT_SCENE: &str = "without next scene";

pub fn evaluation_prompt(
    episode: u64,
    summary: &str,
    key_items: &str,
    current: &str,
    next: &str,
) -> String {
    format!(
        r#"
As a literary expert, critically evaluate the coherence of the **Current Episode ({episode})** within the context of its narrative progression from the **Previous Summary**. Pay special attention to the continuity and consistency of key items and their statuses.

**Key Items from Previous Episodes:**
{key_items}

**Key Aspects to Evaluate:**

1. **Character Consistency** - Evaluate whether the actions and dialogues of main characters in this scene align with their established traits. Note any inconsistencies and assess if they are justified by new developments.

2. **Plot Progression** - Analyze how this scene contributes to the overall story. Assess whether newly introduced elements logically extend the plot and effectively advance or resolve narrative threads.

3. **Emotional and Psychological Realism** - Review the authenticity of the main characters' emotional and psychological responses. Evaluate whether these reactions are believable and consistent with their character development and the situation.

4. **Foreshadowing and Setup for the Next Episode** - Examine how this scene prepares for subsequent developments. Consider whether it hints at future twists or sets the groundwork for upcoming narrative shifts.

5. **Continuity and Consistency in Story Elements** - Examine the episode for any inconsistencies or continuity errors, such as objects appearing or disappearing without explanation, conflicting information, or events that contradict prior established facts. Pay particular attention to items that were lost or destroyed in previous episodes but reappear without explanation. Assess how these issues impact the narrative coherence.

Provide a **balanced and critical** evaluation for each criterion above. Point out both the strengths and weaknesses of the episode, especially regarding the key items. Ensure that your reasoning **clearly supports** the score you assign.

**Previous Summary:**

{summary}

**Current Episode ({episode}):**

{current}

**Next Episode:**

{next}

**Score (0-5) and Justification:**

**Scoring Guidelines:**

- **5 (Excellent):** The episode is exceptionally coherent, with strong character consistency, significant plot progression, authentic emotional responses, and no logical inconsistencies. Key items are used consistently throughout. There are virtually no flaws.

- **4 (Good):** The episode is generally coherent, but there are minor issues in character consistency, plot progression, emotional realism, or minor inconsistencies with key items that slightly detract from the overall narrative.

- **3 (Fair):** The episode has moderate coherence, with noticeable problems, including some inconsistencies with key items that affect the narrative flow.

- **2 (Poor):** The episode has significant coherence issues, with major inconsistencies, including significant continuity errors involving key items.

- **1 (Very Poor):** The episode is highly incoherent, with severe flaws, including critical continuity errors with key items that undermine the narrative.

- **0 (Unacceptable):** The episode is completely incoherent, with fundamental flaws such as key items reappearing or disappearing without any explanation, making the episode nonsensical.
"#
    )
}

// ---------------------------------------------------------------------------
// evaluate — summary and key-item refresh
// ---------------------------------------------------------------------------

pub const UPDATE_SYSTEM: &str = "You are a professional story analyst.";

pub fn update_prompt(episode: u64, summary: &str, key_items: &str, current: &str) -> String {
    format!(
        r#"
As a careful reader, you need to analyze the development of the story in depth, paying special attention to key items that have a significant impact on the plot and character development. As you read, continue to update and expand your analysis to build a comprehensive picture of the story.

You are currently reading **Episode {episode}**.

Based on the previous summary and the current episode, please provide an updated analysis covering the following areas:

**Story Development:**

- Outline the overall plot direction and key events.
- Highlight how new events connect to or develop previous plots.

**Major Turning Points:**

- Describe important plot twists or escalations of conflict.
- Analyze how these turning points affect the overall narrative and character trajectory.

**Character Analysis:**

For each major character and important supporting character:

- Briefly describe their role in the story.
- Examine their psychological state, emotional reactions, and motivations.
- Track their development over time, noting any major changes or revelations.

**Character Relationships:**

- Analyze the interactions and relationship dynamics between characters.
- Note any changes in relationships and their impact on the story.

**Key Item Tracking:**

Identify and track items that have a significant impact on the plot or character development.

For each key item, provide:

- **Item Name**
- **Current Status** (e.g., Owned, Lost, Damaged, Changed)
- **Last Known Location or Owner**
- **Current Importance to the Plot or Character**

Only include items that truly impact the story. Avoid listing insignificant everyday items.

**Unresolved Conflicts:**

- Identify any unresolved conflicts, unresolved storylines, or suspense elements.

**Previous Summary:**

{summary}

**Previous Key Items and Their Statuses:**

{key_items}

**Current Episode ({episode}):**

{current}

Please provide the updated summary and a list of key items with their statuses in the following format:

**Updated Summary:**
[Your updated summary here]

**Updated Key Items and Their Statuses:**

Item Name:
- Current Status: [Status]
- Last Known Location/Owner: [Location/Owner]
- Current Importance: [Importance]

[More items...]

For items that have changed status, please update the corresponding item's status. This is for particularly important items and major mission changes. If not, please do not force it in, as it will only destroy the integrity of the summary.
"#
    )
}

// ---------------------------------------------------------------------------
// qa — retrieval question answering
// ---------------------------------------------------------------------------

/// System message for retrieval answers. The operator's question is sent
/// as the user message.
pub fn answer_system(context: &str) -> String {
    format!(
        "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n\
{context}"
    )
}
